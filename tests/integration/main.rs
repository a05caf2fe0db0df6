//! Integration tests: listings → window → gate → book → dispatch, with
//! an in-memory order gateway standing in for the signing service.

mod mock_gateway;
mod trade_flow;
