pub mod domain;
pub mod error;
pub mod ip;
pub mod remote;
pub mod repository;
pub mod service;

pub use domain::*;
pub use error::{BlogError, BlogResult};
pub use ip::{FixedResolver, IpResolver, LookupResolver};
pub use remote::RestBlogRepository;
pub use repository::{BlogRepository, SqliteBlogRepository};
pub use service::BlogService;
