//! Dial-address canonicalisation.
//!
//! A full address is `network!host!port!tree`; anything shorter is filled
//! with the defaults `tcp`, the `zx` service port, and the `main` tree.

/// Canonicalise a user-supplied address:
///
/// | input          | canonical            |
/// |----------------|----------------------|
/// | `h`            | `tcp!h!zx!main`      |
/// | `h!p`          | `tcp!h!p!main`       |
/// | `n!h!p`        | `n!h!p!main`         |
/// | four or more   | unchanged            |
pub fn fill_addr(addr: &str) -> String {
    let toks: Vec<&str> = addr.split('!').collect();
    match toks.len() {
        1 => format!("tcp!{}!zx!main", toks[0]),
        2 => format!("tcp!{}!{}!main", toks[0], toks[1]),
        3 => format!("{addr}!main"),
        _ => addr.to_string(),
    }
}

/// Split a canonical address into connection address and tree name.
///
/// Only called with `fill_addr` output; an address with no `!` here is a
/// programmer error.
pub(crate) fn split_addr(addr: &str) -> (&str, &str) {
    match addr.rfind('!') {
        Some(n) => (&addr[..n], &addr[n + 1..]),
        None => panic!("bad address"),
    }
}
