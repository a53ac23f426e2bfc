pub mod sites;
pub mod title;

pub use sites::{ContentKind, SiteDatabase, SiteDef, SiteError, SiteMatch};
pub use title::clean_title;
