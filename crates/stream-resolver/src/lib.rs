//! Live stream resolution.
//!
//! Turns a channel handle (`@ZoodioThailand`, `ZoodioThailand`) or a watch-page
//! URL into a media URL that a decoder can open directly. A channel that is not
//! broadcasting right now resolves to [`Resolution::NotLive`], which is an
//! ordinary outcome rather than an error.
//!
//! ```ignore
//! use stream_resolver::{Resolution, StreamResolver, YtDlpResolver};
//!
//! let resolver = YtDlpResolver::new(Default::default());
//! match resolver.resolve("@ZoodioThailand").await? {
//!     Resolution::Live(media) => println!("{}", media.url),
//!     Resolution::NotLive => println!("try again later"),
//! }
//! ```

pub mod error;
pub mod media;
pub mod resolver;
pub mod ytdlp;

pub use error::ResolveError;
pub use media::{MediaUrl, Resolution};
pub use resolver::{StreamResolver, StreamTarget};
pub use ytdlp::{YtDlpConfig, YtDlpResolver};
