pub use self::asset::*;
pub use self::asset_kind::*;
pub use self::bundle::*;
pub use self::bundle_declaration::*;

mod asset;
mod asset_kind;
mod bundle;
mod bundle_declaration;
