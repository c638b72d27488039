//! Hydrological analysis on D8 flow grids
//!
//! - Conditioning: pit filling, Priority-Flood depression filling and
//!   flat resolution (Barnes 2014)
//! - Flow direction and flow accumulation
//! - Drainage thresholding, outlet snapping and catchment delineation
//! - Stream network vectorisation with Strahler ordering
//! - HAND (Height Above Nearest Drainage) and inundation depth

mod conditioning;
mod flats;
pub(crate) mod flow_accumulation;
mod flow_direction;
mod flow_distance;
mod hand;
mod priority_flood;
mod stream_network;
mod watershed;

pub use conditioning::{condition_dem, fill_pits, ConditionDem, ConditionParams};
pub use flats::{resolve_flats, ResolveFlatsParams};
pub use flow_accumulation::flow_accumulation;
pub use flow_direction::{flow_direction, FlowDirection};
pub use flow_distance::flow_distance;
pub use hand::{depth_suffix, hand, inundation_depth, inundation_mask};
pub use priority_flood::{fill_depressions, FillDepressions};
pub use stream_network::{assign_orders, extract_network, stream_order, StreamReach};
pub use watershed::{
    clip_to_catchment, delineate, snap, threshold, CatchmentWindow, Delineate, DrainageMask,
    Outlet, SnapParams,
};
