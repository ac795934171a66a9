pub mod channels;
pub mod grid;
pub mod states;

pub use channels::{
    Channel, ChannelRecord, ChannelRules, ChannelSet, Sector, TwoBodyChannel, TwoBodyKey,
};
pub use grid::{GridConfig, GridError, GridSet, GridShape, PacketWeight, WavePacketGrid};
pub use states::{BasisState, SwpBasisIndex, SwpState, WavePacketBasis};
