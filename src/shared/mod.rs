// This is free and unencumbered software released into the public domain.

mod config;
pub use config::*;

mod devices;
pub use devices::*;

mod driver;
pub use driver::*;

pub mod drivers {
    #[cfg(feature = "ffmpeg")]
    pub mod ffmpeg;

    pub mod synthetic;

    #[cfg(all(target_os = "android", feature = "android"))]
    pub mod android;

    #[cfg(all(target_os = "android", feature = "android"))]
    pub mod camera2;
}

mod error;
pub use error::*;

mod executor;
pub use executor::*;

mod fps;
pub use fps::*;

mod frame;
pub use frame::*;

mod open;
pub use open::*;

mod permission;
pub use permission::*;

mod processing;
pub use processing::*;

mod session;
pub use session::*;

mod surface;
pub use surface::*;

mod viewer;
pub use viewer::*;
