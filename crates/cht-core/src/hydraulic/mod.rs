//! Hydrology on a filled DEM: D8 flow routing → channel heads → junction
//! network → ridges and hilltops.
pub mod channel_heads;
pub mod flow_routing;
pub mod stream_network;

pub use channel_heads::ChannelHeadInput;
pub use flow_routing::{BoundaryCondition, FlowInfo};
pub use stream_network::JunctionNetwork;
