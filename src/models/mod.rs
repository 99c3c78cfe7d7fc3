/// Record types shared by the session, content and engagement layers
///
/// Field names follow the remote table columns so rows deserialize directly.

pub mod comment;
pub mod profile;
pub mod video;

pub use comment::{Comment, NewComment};
pub use profile::{Profile, ProfileUpdate};
pub use video::{NewVideo, Video, VideoDraft, VideoFilter, CATEGORIES};
