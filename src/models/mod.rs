pub mod account;
pub mod enums;
pub mod filters;
pub mod geography;
pub mod lookup;
pub mod patient;
pub mod settings;
pub mod staff;

pub use account::*;
pub use enums::*;
pub use filters::*;
pub use geography::*;
pub use lookup::*;
pub use patient::*;
pub use settings::*;
pub use staff::*;
