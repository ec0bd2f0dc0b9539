pub mod handlers;
pub mod memory;
pub mod payload;
pub mod postgres;
pub mod render;
pub mod store;

pub use memory::MemoryResumeStore;
pub use postgres::PgResumeStore;
pub use store::ResumeStore;
