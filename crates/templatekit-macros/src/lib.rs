use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Index, Member, Type};

/// `Option<T>` fields are overridden wholesale; every other field is merged
/// recursively and must implement `Merge` itself.
fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "Option")
            .unwrap_or(false),
        _ => false,
    }
}

fn merge_statement(member: Member, ty: &Type) -> TokenStream2 {
    if is_option(ty) {
        quote! {
            if overrides.#member.is_some() {
                self.#member = overrides.#member;
            }
        }
    } else {
        quote! {
            ::templatekit_core::Merge::merge(&mut self.#member, overrides.#member);
        }
    }
}

/// Derives `templatekit_core::Merge` for a properties struct.
///
/// ```ignore
/// #[derive(Clone, Default, PartialEq, Merge)]
/// struct CardProperties {
///     base: BaseProperties,
///     title: Option<String>,
/// }
/// ```
#[proc_macro_derive(Merge)]
pub fn derive_merge(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(name, "Merge can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let statements: Vec<TokenStream2> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|field| {
                field
                    .ident
                    .clone()
                    .map(|ident| merge_statement(Member::Named(ident), &field.ty))
            })
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(index, field)| merge_statement(Member::Unnamed(Index::from(index)), &field.ty))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let expanded = quote! {
        impl #impl_generics ::templatekit_core::Merge for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn merge(&mut self, overrides: Self) {
                #(#statements)*
            }
        }
    };
    expanded.into()
}
