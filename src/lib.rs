pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod registry;
pub mod remote;
pub mod tasks {
    pub mod fetcher;
    pub mod slideshow;
    pub mod supervisor;
}
