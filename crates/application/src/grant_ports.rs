mod inputs;
mod repository;
mod views;

pub use inputs::{CreateRegionGrantInput, GrantPage, RegionGrantQuery};
pub use repository::GrantRepository;
pub use views::RegionGrantView;
