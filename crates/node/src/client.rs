//! HTTP realization of the wire contract, client side.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::StatusCode;
use ringlet_core::error::Error as CoreError;
use ringlet_core::error::Result as CoreResult;
use ringlet_core::transport::codec;
use ringlet_core::transport::Request;
use ringlet_core::transport::Response;
use ringlet_core::transport::Transport;

use crate::error::Result;

/// Sends ring verbs as plain-text HTTP exchanges.
///
/// The deadline configured here is a second line of defence; the remote
/// proxy enforces the authoritative one around the whole exchange.
pub struct HttpTransport {
    client: reqwest::Client,
    bits: usize,
}

enum Shape {
    Ack,
    Addr,
    Addrs,
    Keys,
    Value,
}

fn shape_of(request: &Request) -> Shape {
    match request {
        Request::Heartbeat
        | Request::SetFingerNode(..)
        | Request::SetSuccessorList(_)
        | Request::SetPredecessor(_)
        | Request::Disassociate(_) => Shape::Ack,
        Request::GetFingerNode(_)
        | Request::GetSuccessor
        | Request::GetPredecessor
        | Request::FindSuccessor(_)
        | Request::FindPredecessor(_) => Shape::Addr,
        Request::GetSuccessorList => Shape::Addrs,
        Request::KeysInRange(..) => Shape::Keys,
        Request::GetValue(_) => Shape::Value,
    }
}

impl HttpTransport {
    pub fn new(deadline: Duration, bits: usize) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(deadline).build()?;
        Ok(Self { client, bits })
    }

    fn build(
        &self,
        target: SocketAddr,
        request: &Request,
    ) -> reqwest::RequestBuilder {
        let url = |path: String| format!("http://{target}/{path}");
        match request {
            Request::Heartbeat => self.client.get(url("node/heartbeat".into())),
            Request::GetFingerNode(index) => {
                self.client.get(url(format!("node/fingers/{index}")))
            }
            Request::SetFingerNode(index, addr) => self
                .client
                .put(url(format!("node/fingers/{index}")))
                .body(codec::encode_addr(addr)),
            Request::GetSuccessor => self.client.get(url("node/successor".into())),
            Request::GetSuccessorList => self.client.get(url("node/successors".into())),
            Request::GetPredecessor => self.client.get(url("node/predecessor".into())),
            Request::SetSuccessorList(addrs) => self
                .client
                .put(url("node/successors".into()))
                .body(codec::encode_addrs(addrs)),
            Request::SetPredecessor(addr) => self
                .client
                .put(url("node/predecessor".into()))
                .body(codec::encode_addr(addr)),
            Request::FindSuccessor(id) => {
                self.client.get(url(format!("node/successors/find/{id}")))
            }
            Request::FindPredecessor(id) => {
                self.client.get(url(format!("node/predecessors/find/{id}")))
            }
            Request::Disassociate(id) => self
                .client
                .request(Method::DELETE, url(format!("node/peers/{id}"))),
            Request::KeysInRange(from, to) => {
                self.client.get(url(format!("store/keys/{from}/{to}")))
            }
            Request::GetValue(id) => self.client.get(url(format!("store/values/{id}"))),
        }
    }

    fn decode(&self, shape: Shape, body: &[u8]) -> CoreResult<Response> {
        let text = || {
            std::str::from_utf8(body)
                .map_err(|_| CoreError::Malformed("reply body is not UTF-8".into()))
        };
        match shape {
            Shape::Ack => Ok(Response::Ack),
            Shape::Addr => Ok(Response::Addr(codec::parse_addr(text()?)?)),
            Shape::Addrs => Ok(Response::Addrs(codec::parse_addrs(text()?)?)),
            Shape::Keys => Ok(Response::Keys(codec::parse_ids(text()?, self.bits)?)),
            Shape::Value => Ok(Response::Value(body.to_vec())),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, target: SocketAddr, request: Request) -> CoreResult<Response> {
        let reply = match self.build(target, &request).send().await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => return Err(CoreError::Timeout(target)),
            Err(_) => return Err(CoreError::Unreachable(target)),
        };

        let status = reply.status();
        let body = reply
            .bytes()
            .await
            .map_err(|_| CoreError::Unreachable(target))?;

        if status.is_success() {
            return self.decode(shape_of(&request), &body);
        }
        match status {
            StatusCode::BAD_REQUEST => Err(CoreError::Malformed(format!(
                "peer rejected request: {}",
                String::from_utf8_lossy(&body)
            ))),
            StatusCode::NOT_FOUND => match &request {
                Request::GetPredecessor => Err(CoreError::PredecessorUnset),
                Request::GetValue(key) => Err(CoreError::KeyNotFound(key.to_string())),
                _ => Err(CoreError::Unreachable(target)),
            },
            _ => Err(CoreError::Unreachable(target)),
        }
    }
}
