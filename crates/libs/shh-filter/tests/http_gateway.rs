use serde_json::{json, Value as JsonValue};
use shh_filter::{
    FilterHandlers, FilterState, HttpGateway, MessageFilterOptions, RpcGateway, Shh, ShhConfig,
    ShhError,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = Arc<dyn Fn(&str, &JsonValue) -> JsonValue + Send + Sync>;

/// Minimal JSON-RPC node answering every request through `handler`, which
/// returns either `{"result": ..}` or `{"error": ..}`.
struct TestNode {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<JsonValue>>>,
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

impl TestNode {
    async fn start(handler: Handler) -> Self {
        init_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test node");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move { serve(stream, handler, log).await });
            }
        });
        Self { addr, requests }
    }

    fn config(&self) -> ShhConfig {
        let mut config = ShhConfig::default();
        config.set_endpoint(self.addr.to_string());
        config.set_poll_interval_ms(20);
        config.set_request_timeout_ms(2_000);
        config
    }

    fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .iter()
            .filter_map(|request| request["method"].as_str().map(str::to_owned))
            .collect()
    }
}

async fn serve(mut stream: TcpStream, handler: Handler, log: Arc<Mutex<Vec<JsonValue>>>) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    let body = loop {
        let read = stream.read(&mut chunk).await.expect("read request");
        if read == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .expect("content-length header");
        let body_start = header_end + 4;
        if buffer.len() >= body_start + length {
            break buffer[body_start..body_start + length].to_vec();
        }
    };

    let request: JsonValue = serde_json::from_slice(&body).expect("json-rpc request");
    log.lock().expect("requests mutex poisoned").push(request.clone());
    let method = request["method"].as_str().unwrap_or_default();
    let mut response = handler(method, &request["params"]);
    response["jsonrpc"] = json!("2.0");
    response["id"] = request["id"].clone();

    let body = serde_json::to_vec(&response).expect("encode response");
    let mut reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    reply.extend_from_slice(&body);
    stream.write_all(&reply).await.expect("write response");
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn http_gateway_round_trips_results_and_errors() {
    let node = TestNode::start(Arc::new(|method: &str, params: &JsonValue| match method {
        "shh_version" => json!({ "result": "6.0" }),
        "shh_hasSymKey" if params == &json!(["sym-1"]) => json!({ "result": true }),
        _ => json!({ "error": { "code": -32601, "message": "method not found" } }),
    }))
    .await;

    let gateway = HttpGateway::from_config(&node.config()).expect("gateway");
    assert_eq!(gateway.call("shh_version", Vec::new()).await, Ok(json!("6.0")));
    assert_eq!(gateway.call("shh_hasSymKey", vec![json!("sym-1")]).await, Ok(json!(true)));
    assert_eq!(
        gateway.call("shh_subscribe", Vec::new()).await,
        Err(ShhError::Rpc { code: -32601, message: "method not found".to_owned() })
    );

    let ids = node
        .requests
        .lock()
        .expect("requests mutex poisoned")
        .iter()
        .map(|request| request["id"].clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn silent_node_times_out() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let gateway =
        HttpGateway::new(addr.to_string()).with_request_timeout(Duration::from_millis(50));
    let err = gateway.call("shh_info", Vec::new()).await.expect_err("timeout");
    assert_eq!(err, ShhError::Timeout { operation: "shh_info".to_owned() });
    assert!(err.is_retryable());
}

#[tokio::test]
async fn message_filter_polls_over_http_and_uninstalls() {
    let polls = Arc::new(Mutex::new(0_usize));
    let poll_count = Arc::clone(&polls);
    let node = TestNode::start(Arc::new(move |method: &str, _params: &JsonValue| match method {
        "shh_newMessageFilter" => json!({ "result": "0xf1" }),
        "shh_getFilterMessages" => {
            let mut count = poll_count.lock().expect("poll mutex poisoned");
            *count += 1;
            if *count == 2 {
                json!({ "result": [{ "payload": "0x68656c6c6f" }] })
            } else {
                json!({ "result": [] })
            }
        }
        "shh_deleteMessageFilter" => json!({ "result": true }),
        _ => json!({ "error": { "code": -32601, "message": "method not found" } }),
    }))
    .await;

    let shh = Shh::connect(&node.config()).expect("connect");
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let handlers = FilterHandlers::new().on_message(move |item| {
        sink.lock().expect("delivered mutex poisoned").push(item);
    });
    let filter = shh
        .new_message_filter(&MessageFilterOptions::symmetric("sym-1"), handlers)
        .expect("valid options");

    filter.installed().await.expect("installed");
    wait_until(|| !delivered.lock().expect("delivered mutex poisoned").is_empty()).await;
    assert_eq!(
        delivered.lock().expect("delivered mutex poisoned").clone(),
        vec![json!({ "payload": "0x68656c6c6f" })]
    );

    filter.stop_watching();
    assert_eq!(filter.state(), FilterState::Stopped);
    wait_until(|| node.methods().iter().any(|method| method == "shh_deleteMessageFilter")).await;
    let uninstalls =
        node.methods().into_iter().filter(|method| method == "shh_deleteMessageFilter").count();
    assert_eq!(uninstalls, 1);
}

#[tokio::test]
async fn public_chats_join_poll_and_leave_over_http() {
    let node = TestNode::start(Arc::new(|method: &str, params: &JsonValue| match method {
        "shhext_joinPublicChats" => {
            let chats = params[0]["chats"].as_array().cloned().unwrap_or_default();
            let ids = (0..chats.len()).map(|index| json!(format!("0xc{index}"))).collect::<Vec<_>>();
            json!({ "result": ids })
        }
        "shh_getFilterMessages" if params == &json!(["0xc1"]) => {
            json!({ "result": [{ "text": "gm" }] })
        }
        "shh_getFilterMessages" => json!({ "result": [] }),
        "shhext_leavePublicChats" => json!({ "result": null }),
        _ => json!({ "error": { "code": -32601, "message": "method not found" } }),
    }))
    .await;

    let shh = Shh::connect(&node.config()).expect("connect");
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let handlers = FilterHandlers::new().on_chat_message(move |chat, item| {
        sink.lock().expect("delivered mutex poisoned").push((chat.to_owned(), item));
    });

    let filters = shh.join_public_chats(["status", "rust"], handlers).await.expect("join");
    assert_eq!(filters.len(), 2);
    assert_eq!(filters[1].chat(), "rust");

    wait_until(|| !delivered.lock().expect("delivered mutex poisoned").is_empty()).await;
    assert_eq!(
        delivered.lock().expect("delivered mutex poisoned")[0],
        ("rust".to_owned(), json!({ "text": "gm" }))
    );

    shh.leave_public_chats(&filters).await.expect("leave");
    assert!(filters.iter().all(|chat_filter| chat_filter.filter().state() == FilterState::Stopped));
    let methods = node.methods();
    assert_eq!(methods.first().map(String::as_str), Some("shhext_joinPublicChats"));
    assert_eq!(methods.iter().filter(|method| *method == "shhext_leavePublicChats").count(), 1);
    assert!(!methods.iter().any(|method| method == "shh_deleteMessageFilter"));
}
