#![doc = include_str!("../README.md")]

pub mod btree;
pub mod consts;
pub mod context;
pub mod dataset;
pub mod driver;
pub mod drusilla;
pub mod error;
pub mod external;
pub mod ground_truth;
pub mod heap;
pub mod io;
pub mod linear_scan;
pub mod math;
pub mod ml_rqalsh;
pub mod page_store;
pub mod qdafn;
pub mod rqalsh;
pub mod rqalsh_star;
pub mod space_usage;

pub use dataset::Dataset;
pub use error::{AfnError, Result};
pub use heap::{FnResult, TopKHeap};
pub use space_usage::SpaceUsage;
