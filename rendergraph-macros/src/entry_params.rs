use darling::FromField;
use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;

use crate::rendergraph_name;

#[derive(FromField, Default)]
#[darling(attributes(resource), default)]
struct ResourceAttr {
    access: Option<String>,
}

#[derive(FromField, Default)]
#[darling(attributes(arg), default)]
struct ArgAttr {}

/// Recognized `AccessFlags` constant names, matching the bitflags declared in
/// `rendergraph::access`. Kept as a flat list rather than reflecting the bitflags type itself,
/// since a proc-macro crate cannot depend on the crate whose derive it implements.
const KNOWN_ACCESS_FLAGS: &[&str] = &[
    "render_target",
    "depth_read",
    "depth_write",
    "stencil_read",
    "stencil_write",
    "shader_read",
    "shader_write",
    "copy_src",
    "copy_dst",
    "resolve_src",
    "resolve_dst",
    "present",
    "indirect_args",
    "vertex_buffer",
    "index_buffer",
    "constant_buffer",
    "shading_rate_image",
    "predication",
    "stream_out",
    "raytracing_as",
    "clear",
    "discard_before",
    "discard_after",
    "cpu_read",
    "cpu_write",
    "relaxed",
];

fn access_flags_expr(gfx: &syn::Path, access: &str, span: proc_macro2::Span) -> syn::Result<TokenStream> {
    let mut terms = Vec::new();
    for name in access.split('|').map(str::trim).filter(|s| !s.is_empty()) {
        if !KNOWN_ACCESS_FLAGS.contains(&name) {
            return Err(syn::Error::new(
                span,
                format!("unknown access flag `{}`; expected one of {:?}", name, KNOWN_ACCESS_FLAGS),
            ));
        }
        let ident = syn::Ident::new(&name.to_uppercase(), span);
        terms.push(quote! { #gfx::access::AccessFlags::#ident.bits() });
    }
    if terms.is_empty() {
        return Err(syn::Error::new(span, "`access` must name at least one flag"));
    }
    Ok(quote! {
        #gfx::access::AccessFlags::from_bits_truncate(0 #(| #terms)*)
    })
}

pub fn generate(ast: &syn::DeriveInput, fields: &syn::Fields) -> TokenStream {
    let gfx = rendergraph_name();
    let struct_name = &ast.ident;
    let struct_name_str = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let fields = match fields {
        syn::Fields::Named(named) => &named.named,
        syn::Fields::Unnamed(_) => {
            return syn::Error::new(ast.span(), "EntryParams cannot be derived on tuple structs")
                .to_compile_error()
        }
        syn::Fields::Unit => {
            return syn::Error::new(ast.span(), "EntryParams cannot be derived on unit structs")
                .to_compile_error()
        }
    };

    let mut param_entries = Vec::new();

    for f in fields.iter() {
        let field_name = f.ident.as_ref().unwrap().to_string();
        let ty = &f.ty;

        let is_resource = f.attrs.iter().any(|a| a.path().is_ident("resource"));
        let is_arg = f.attrs.iter().any(|a| a.path().is_ident("arg"));

        if is_resource && is_arg {
            return syn::Error::new(f.span(), "field cannot be both `#[resource]` and `#[arg]`")
                .to_compile_error();
        }

        if is_resource {
            let attr = match <ResourceAttr as FromField>::from_field(f) {
                Ok(a) => a,
                Err(e) => return e.write_errors(),
            };
            let access_str = attr.access.unwrap_or_default();
            let access_expr = match access_flags_expr(&gfx, &access_str, f.span()) {
                Ok(expr) => expr,
                Err(e) => return e.to_compile_error(),
            };
            param_entries.push(quote! {
                #gfx::signature::ParamDesc {
                    name: #field_name,
                    type_info: #gfx::signature::TypeInfo {
                        size: 0,
                        type_id: || ::std::any::TypeId::of::<()>(),
                    },
                    array_size: 1,
                    flags: #gfx::signature::ParamFlags::RESOURCE,
                    access: #gfx::access::Access::new(#access_expr),
                }
            });
        } else if is_arg {
            param_entries.push(quote! {
                #gfx::signature::ParamDesc {
                    name: #field_name,
                    type_info: #gfx::signature::TypeInfo {
                        size: ::std::mem::size_of::<#ty>(),
                        type_id: || ::std::any::TypeId::of::<#ty>(),
                    },
                    array_size: 1,
                    flags: #gfx::signature::ParamFlags::empty(),
                    access: #gfx::access::Access::new(#gfx::access::AccessFlags::empty()),
                }
            });
        } else {
            return syn::Error::new(
                f.span(),
                "every `EntryParams` field must be annotated `#[resource(access = \"...\")]` or `#[arg]`",
            )
            .to_compile_error();
        }
    }

    let param_count = param_entries.len();
    let params_static = quote::format_ident!("__{}_ENTRY_PARAMS", struct_name);

    quote! {
        #[doc(hidden)]
        static #params_static: [#gfx::signature::ParamDesc; #param_count] = [
            #(#param_entries),*
        ];

        impl #impl_generics #struct_name #ty_generics #where_clause {
            pub const SIGNATURE: #gfx::signature::EntrySignature = #gfx::signature::EntrySignature {
                name: #struct_name_str,
                params: &#params_static,
            };
        }
    }
}
