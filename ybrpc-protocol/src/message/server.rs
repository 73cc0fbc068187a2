//! Generic server messages (`yb.server`), answered by masters and tablet servers alike.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingResponsePb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerClockRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerClockResponsePb {
    /// Current hybrid time of the server.
    #[prost(fixed64, optional, tag = "1")]
    pub hybrid_time: Option<u64>,
}
