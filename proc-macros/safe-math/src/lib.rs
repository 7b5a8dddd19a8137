use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, BinOp, Expr, Ident};

/// Checked decimal arithmetic.
///
/// Rewrites every `+`, `-`, `*`, `/` and `%` in the expression into the
/// matching `checked_*` call, so the whole expression evaluates to
/// `Option<Decimal>` and yields `None` on overflow or division by zero.
///
/// Leaf operands may be either `Decimal` or `Option<Decimal>`, and the caller
/// must have `DecimalExt` in scope, e.g.:
///
/// ```ignore
/// use symm_core::core::decimal_ext::DecimalExt;
///
/// let notional = safe!(amount * price + fee).ok_or_eyre("Math overflow")?;
/// ```
#[proc_macro]
pub fn safe(input: TokenStream) -> TokenStream {
    let expr = parse_macro_input!(input as Expr);
    checked_expr(&expr).into()
}

fn checked_expr(expr: &Expr) -> TokenStream2 {
    match expr {
        Expr::Paren(paren) => checked_expr(&paren.expr),
        Expr::Group(group) => checked_expr(&group.expr),
        Expr::Binary(binary) => match checked_method(&binary.op) {
            Some(method) => {
                let lhs = checked_expr(&binary.left);
                let rhs = checked_expr(&binary.right);
                quote! {
                    match (#lhs, #rhs) {
                        (Some(lhs), Some(rhs)) => lhs.#method(rhs),
                        _ => None,
                    }
                }
            }
            None => checked_operand(expr),
        },
        _ => checked_operand(expr),
    }
}

fn checked_operand(expr: &Expr) -> TokenStream2 {
    quote! {
        DecimalExt::checked_operand(&(#expr))
    }
}

fn checked_method(op: &BinOp) -> Option<Ident> {
    let name = match op {
        BinOp::Add(_) => "checked_add",
        BinOp::Sub(_) => "checked_sub",
        BinOp::Mul(_) => "checked_mul",
        BinOp::Div(_) => "checked_div",
        BinOp::Rem(_) => "checked_rem",
        _ => return None,
    };
    Some(Ident::new(name, Span::call_site()))
}
