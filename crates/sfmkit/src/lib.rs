#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use sfmkit_geometry as geometry;

#[doc(inline)]
pub use sfmkit_io as io;

#[doc(inline)]
pub use sfmkit_export as export;
