//! Combinators over effects.
//!
//! - [`bracket`](mod@bracket): acquire/use/release resource safety
//! - [`par`]: two-, three- and N-way parallel joins

pub mod bracket;
pub mod par;

pub use bracket::bracket;
pub use par::par_map_n;
