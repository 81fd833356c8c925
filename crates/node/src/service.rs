//! HTTP realization of the wire contract, server side, plus the text
//! inspection pages.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::delete;
use axum::routing::get;
use axum::Router;
use ringlet_core::error::Error as CoreError;
use ringlet_core::error::Result as CoreResult;
use ringlet_core::inspect::NodeInspect;
use ringlet_core::node::NodeHandle;
use ringlet_core::transport::codec;
use ringlet_core::transport::Request;
use ringlet_core::transport::Response as WireResponse;
use ringlet_core::transport::WireStatus;
use ringlet_core::NodePool;
use ringlet_core::RingId;

use crate::error::Result;

type PoolExt = Extension<Arc<NodePool>>;

/// Serve the wire protocol for `pool` until the listener dies.
pub async fn run_service(bind: SocketAddr, pool: Arc<NodePool>) -> Result<()> {
    let app = Router::new()
        .route("/info", get(info))
        .route("/info/ring", get(info_ring))
        .route("/info/fix", get(info_fix))
        .route("/node/heartbeat", get(heartbeat))
        .route(
            "/node/fingers/:index",
            get(get_finger_node).put(set_finger_node),
        )
        .route("/node/successor", get(get_successor))
        .route(
            "/node/successors",
            get(get_successor_list).put(set_successor_list),
        )
        .route("/node/successors/find/:id", get(find_successor))
        .route(
            "/node/predecessor",
            get(get_predecessor).put(set_predecessor),
        )
        .route("/node/predecessors/find/:id", get(find_predecessor))
        .route("/node/peers/:id", delete(disassociate))
        .route("/store/keys/:from/:to", get(keys_in_range))
        .route(
            "/store/values/:id",
            get(get_value).put(put_value).delete(remove_value),
        )
        .layer(Extension(pool));

    tracing::info!("serving the ring protocol on http://{}", bind);
    axum::Server::bind(&bind)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn serve(pool: Arc<NodePool>, request: Request) -> axum::response::Response {
    encode(pool.serve(request).await)
}

fn encode(result: CoreResult<WireResponse>) -> axum::response::Response {
    match result {
        Ok(WireResponse::Ack) => StatusCode::NO_CONTENT.into_response(),
        Ok(WireResponse::Addr(addr)) => (StatusCode::OK, codec::encode_addr(&addr)).into_response(),
        Ok(WireResponse::Addrs(addrs)) => {
            (StatusCode::OK, codec::encode_addrs(&addrs)).into_response()
        }
        Ok(WireResponse::Keys(keys)) => (StatusCode::OK, codec::encode_ids(&keys)).into_response(),
        Ok(WireResponse::Value(value)) => (StatusCode::OK, value).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &CoreError) -> axum::response::Response {
    let status = match WireStatus::from(error) {
        WireStatus::BadRequest => StatusCode::BAD_REQUEST,
        WireStatus::NotFound => match error {
            CoreError::PredecessorUnset | CoreError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::FAILED_DEPENDENCY,
        },
        WireStatus::Ok => StatusCode::OK,
    };
    (status, error.to_string()).into_response()
}

fn ring_id(pool: &NodePool, text: &str) -> CoreResult<RingId> {
    codec::parse_id(text, pool.config().ring_bit_width)
}

async fn heartbeat(Extension(pool): PoolExt) -> axum::response::Response {
    serve(pool, Request::Heartbeat).await
}

async fn get_finger_node(
    Extension(pool): PoolExt,
    Path(index): Path<usize>,
) -> axum::response::Response {
    serve(pool, Request::GetFingerNode(index)).await
}

async fn set_finger_node(
    Extension(pool): PoolExt,
    Path(index): Path<usize>,
    body: String,
) -> axum::response::Response {
    match codec::parse_addr(&body) {
        Ok(addr) => serve(pool, Request::SetFingerNode(index, addr)).await,
        Err(e) => error_response(&e),
    }
}

async fn get_successor(Extension(pool): PoolExt) -> axum::response::Response {
    serve(pool, Request::GetSuccessor).await
}

async fn get_successor_list(Extension(pool): PoolExt) -> axum::response::Response {
    serve(pool, Request::GetSuccessorList).await
}

async fn set_successor_list(
    Extension(pool): PoolExt,
    body: String,
) -> axum::response::Response {
    match codec::parse_addrs(&body) {
        Ok(addrs) => serve(pool, Request::SetSuccessorList(addrs)).await,
        Err(e) => error_response(&e),
    }
}

async fn get_predecessor(Extension(pool): PoolExt) -> axum::response::Response {
    serve(pool, Request::GetPredecessor).await
}

async fn set_predecessor(Extension(pool): PoolExt, body: String) -> axum::response::Response {
    match codec::parse_addr(&body) {
        Ok(addr) => serve(pool, Request::SetPredecessor(addr)).await,
        Err(e) => error_response(&e),
    }
}

async fn find_successor(
    Extension(pool): PoolExt,
    Path(id): Path<String>,
) -> axum::response::Response {
    match ring_id(&pool, &id) {
        Ok(id) => serve(pool, Request::FindSuccessor(id)).await,
        Err(e) => error_response(&e),
    }
}

async fn find_predecessor(
    Extension(pool): PoolExt,
    Path(id): Path<String>,
) -> axum::response::Response {
    match ring_id(&pool, &id) {
        Ok(id) => serve(pool, Request::FindPredecessor(id)).await,
        Err(e) => error_response(&e),
    }
}

async fn disassociate(
    Extension(pool): PoolExt,
    Path(id): Path<String>,
) -> axum::response::Response {
    match ring_id(&pool, &id) {
        Ok(id) => serve(pool, Request::Disassociate(id)).await,
        Err(e) => error_response(&e),
    }
}

async fn keys_in_range(
    Extension(pool): PoolExt,
    Path((from, to)): Path<(String, String)>,
) -> axum::response::Response {
    match (ring_id(&pool, &from), ring_id(&pool, &to)) {
        (Ok(from), Ok(to)) => serve(pool, Request::KeysInRange(from, to)).await,
        (Err(e), _) | (_, Err(e)) => error_response(&e),
    }
}

async fn get_value(Extension(pool): PoolExt, Path(id): Path<String>) -> axum::response::Response {
    match ring_id(&pool, &id) {
        Ok(id) => serve(pool, Request::GetValue(id)).await,
        Err(e) => error_response(&e),
    }
}

/// Client-facing write into the local slice of the key space.
async fn put_value(
    Extension(pool): PoolExt,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let id = match ring_id(&pool, &id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    match pool.local().store().set(&id, body.to_vec()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn remove_value(
    Extension(pool): PoolExt,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match ring_id(&pool, &id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    match pool.local().store().remove(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Text snapshot of the local routing tables.
async fn info(Extension(pool): PoolExt) -> axum::response::Response {
    let snapshot = NodeInspect::capture(&pool);
    let mut page = String::new();
    let _ = writeln!(page, "ID:          {}", snapshot.id);
    let _ = writeln!(page, "Address:     {}", snapshot.address);
    let _ = writeln!(
        page,
        "Predecessor: {}",
        snapshot.predecessor.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(page, "\nSuccessor List:");
    for (i, succ) in snapshot.successors.iter().enumerate() {
        let _ = writeln!(page, "{i:>3}:         {succ}");
    }
    let _ = writeln!(page, "\nFinger Table:");
    for (node, first, last) in &snapshot.finger_table {
        let rows = if first == last {
            format!("{first:>3}")
        } else {
            format!("{first:>3}-{last}")
        };
        let _ = writeln!(page, "{rows}:       {}", node.as_deref().unwrap_or("(unresolved)"));
    }
    (StatusCode::OK, page).into_response()
}

/// Walk the ring by successors and list every member found.
async fn info_ring(Extension(pool): PoolExt) -> axum::response::Response {
    const HOP_CAP: usize = 512;

    let local = pool.local();
    let mut page = format!("{}\r\n", local.peer_ref());
    let mut cursor = match local.successor().await {
        Ok(cursor) => cursor,
        Err(e) => return error_response(&e),
    };
    for _ in 0..HOP_CAP {
        if &cursor.id == local.id() {
            break;
        }
        let _ = write!(page, "{cursor}\r\n");
        match pool.get_or_create(&cursor).successor().await {
            Ok(next) => cursor = next,
            Err(e) => {
                let _ = write!(page, "unreachable: {e}\r\n");
                break;
            }
        }
    }
    (StatusCode::OK, page).into_response()
}

/// Force a full fix-fingers pass, for debugging.
async fn info_fix(Extension(pool): PoolExt) -> axum::response::Response {
    match pool.local().fix_all_fingers().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}
