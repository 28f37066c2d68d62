pub mod capture;
pub mod dashcam;
pub mod gallery;
pub mod ipfs;
pub mod network;
pub mod verify;
