//! Proc-macro for auto-deriving entry-point parameter signatures:
//! - `EntryParams` for `rendergraph::signature::EntrySignature`
#![recursion_limit = "128"]

extern crate proc_macro;

mod entry_params;

fn rendergraph_name() -> syn::Path {
    syn::parse_str("rendergraph").unwrap()
}

/// Derives a `SIGNATURE` associated constant describing a struct's fields as an
/// `EntrySignature`, standing in for the reflection a shader compiler would otherwise produce.
///
/// Each field must carry exactly one of:
/// * `#[resource(access = "...")]` — a resource parameter; the field's type must be (or
///   deref to) `rendergraph::resource::View`. `access` names one or more `|`-separated
///   `AccessFlags` constants, e.g. `"render_target"` or `"shader_read|shader_write"`.
/// * `#[arg]` — a plain-old-data argument passed as raw bytes; the field's type must be
///   `Copy` and have a stable `size_of`.
///
/// #### Example
///
/// ```ignore
/// #[derive(EntryParams)]
/// struct HelloTriangleParams {
///     #[resource(access = "render_target")]
///     backbuffer: View,
///     #[arg]
///     clear_color: [f32; 4],
/// }
/// ```
#[proc_macro_derive(EntryParams, attributes(resource, arg))]
pub fn entry_params_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).expect("Couldn't parse item");

    let result = match ast.data {
        syn::Data::Struct(ref s) => entry_params::generate(&ast, &s.fields),
        _ => panic!("EntryParams can only be derived on structs"),
    };

    result.into()
}
