// Copyright 2018-2026 the Deno authors. MIT license.

use crate::client::DebugSessionClient;
use crate::error::InspectorError;
use crate::futures::channel::mpsc;
use crate::futures::channel::mpsc::UnboundedReceiver;
use crate::futures::channel::mpsc::UnboundedSender;
use crate::futures::channel::oneshot;
use crate::futures::future;
use crate::futures::future::Future;
use crate::futures::prelude::*;
use crate::futures::select;
use crate::futures::task::Poll;
use crate::message::InspectorMsg;
use hyper::header;
use hyper::Body;
use hyper::Method;
use hyper::Request;
use hyper::Response;
use hyper::StatusCode;
use log::debug;
use log::error;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::pin;
use std::process;
use std::rc::Rc;
use std::thread;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use url::Url;
use uuid::Uuid;

type InspectorMap = Rc<RefCell<HashMap<Uuid, InspectorInfo>>>;

/// Websocket server that is used to proxy connections from
/// devtools to registered inspector sessions.
pub struct InspectorServer {
  pub host: SocketAddr,
  register_inspector_tx: UnboundedSender<InspectorInfo>,
  shutdown_server_tx: Option<oneshot::Sender<()>>,
  thread_handle: Option<thread::JoinHandle<()>>,
}

impl InspectorServer {
  /// Binds `host` and starts serving on a dedicated thread. Returns once the
  /// server accepts connections. Binding to port 0 picks a free port,
  /// available afterwards as `self.host`.
  pub fn new(
    host: SocketAddr,
    name: &'static str,
  ) -> Result<Self, InspectorError> {
    let listener = std::net::TcpListener::bind(host)?;
    listener.set_nonblocking(true)?;
    let host = listener.local_addr()?;

    let (register_inspector_tx, register_inspector_rx) =
      mpsc::unbounded::<InspectorInfo>();
    let (shutdown_server_tx, shutdown_server_rx) = oneshot::channel();
    let (ready_tx, ready_rx) =
      oneshot::channel::<Result<(), InspectorError>>();

    let thread_handle = thread::Builder::new()
      .name("inspector-server".to_string())
      .spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
          .enable_all()
          .build()
        {
          Ok(rt) => rt,
          Err(err) => {
            let _ = ready_tx.send(Err(err.into()));
            return;
          }
        };
        let local = tokio::task::LocalSet::new();
        local.block_on(
          &rt,
          server(
            listener,
            register_inspector_rx,
            shutdown_server_rx,
            ready_tx,
            name,
          ),
        )
      })?;

    let startup = crate::futures::executor::block_on(ready_rx)
      .unwrap_or_else(|_| {
        Err(std::io::Error::other("Inspector server thread exited").into())
      });
    if let Err(err) = startup {
      let _ = thread_handle.join();
      return Err(err);
    }

    Ok(Self {
      host,
      register_inspector_tx,
      shutdown_server_tx: Some(shutdown_server_tx),
      thread_handle: Some(thread_handle),
    })
  }

  /// Makes `client` reachable from devtools. `outbound_rx` must be the
  /// receiving end of the client's [`crate::ChannelHost`]. Returns the
  /// websocket debugger URL.
  ///
  /// Installs the client's deregister handler, so a client can only be
  /// registered once.
  pub fn register_inspector(
    &self,
    url: String,
    client: &DebugSessionClient,
    outbound_rx: UnboundedReceiver<InspectorMsg>,
    wait_for_session: bool,
  ) -> String {
    let info = InspectorInfo::new(
      self.host,
      client.dispatch_sender(),
      outbound_rx,
      client.add_deregister_handler(),
      url,
      wait_for_session,
    );
    let websocket_url = info.get_websocket_debugger_url(&self.host.to_string());
    if self.register_inspector_tx.unbounded_send(info).is_err() {
      error!(
        "Inspector server is not running, {} is unreachable",
        websocket_url
      );
    }
    websocket_url
  }
}

impl Drop for InspectorServer {
  fn drop(&mut self) {
    if let Some(shutdown_server_tx) = self.shutdown_server_tx.take() {
      // Already gone if the server failed to start.
      let _ = shutdown_server_tx.send(());
    }

    if let Some(thread_handle) = self.thread_handle.take() {
      if thread_handle.join().is_err() {
        error!("Inspector server thread panicked");
      }
    }
  }
}

// Needed so hyper can use non Send futures
#[derive(Clone)]
struct LocalExecutor;

impl<Fut> hyper::rt::Executor<Fut> for LocalExecutor
where
  Fut: Future + 'static,
  Fut::Output: 'static,
{
  fn execute(&self, fut: Fut) {
    tokio::task::spawn_local(fut);
  }
}

fn text_response(
  status: StatusCode,
  body: &'static str,
) -> hyper::http::Result<Response<Body>> {
  Response::builder().status(status).body(body.into())
}

fn json_response(value: &Value) -> hyper::http::Result<Response<Body>> {
  Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, "application/json")
    .body(value.to_string().into())
}

fn handle_request(
  req: Request<Body>,
  inspector_map: InspectorMap,
  json_version_response: &Value,
) -> hyper::http::Result<Response<Body>> {
  let host = request_host(&req);

  match (req.method(), req.uri().path()) {
    (&Method::GET, path) if path.starts_with("/ws/") => {
      handle_ws_request(req, inspector_map)
    }
    (&Method::GET, "/json/version") => json_response(json_version_response),
    (&Method::GET, "/json") | (&Method::GET, "/json/list") => {
      handle_json_request(&inspector_map, host)
    }
    _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
  }
}

/// `host[:port]` from the `Host` header, if it makes a valid URL. Anything
/// else falls back to the listen address.
fn request_host(req: &Request<Body>) -> Option<String> {
  req
    .headers()
    .get(header::HOST)
    .and_then(|host| host.to_str().ok())
    .and_then(|host| Url::parse(&format!("http://{host}")).ok())
    .and_then(|url| match (url.host(), url.port()) {
      (Some(host), Some(port)) => Some(format!("{host}:{port}")),
      (Some(host), None) => Some(host.to_string()),
      (None, _) => None,
    })
}

fn handle_json_request(
  inspector_map: &InspectorMap,
  host: Option<String>,
) -> hyper::http::Result<Response<Body>> {
  let data = inspector_map
    .borrow()
    .values()
    .map(|info| info.get_json_metadata(&host))
    .collect::<Vec<_>>();
  json_response(&Value::Array(data))
}

fn handle_ws_request(
  req: Request<Body>,
  inspector_map: InspectorMap,
) -> hyper::http::Result<Response<Body>> {
  let maybe_uuid = req
    .uri()
    .path()
    .strip_prefix("/ws/")
    .and_then(|s| Uuid::parse_str(s).ok());
  let Some(uuid) = maybe_uuid else {
    return text_response(StatusCode::BAD_REQUEST, "Malformed inspector UUID");
  };

  let is_upgrade = req
    .headers()
    .get(header::UPGRADE)
    .and_then(|value| value.to_str().ok())
    .is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
  let maybe_key = req
    .headers()
    .get(header::SEC_WEBSOCKET_KEY)
    .map(|key| derive_accept_key(key.as_bytes()));
  let accept_key = match maybe_key {
    Some(accept_key) if is_upgrade => accept_key,
    _ => {
      return text_response(
        StatusCode::BAD_REQUEST,
        "Not a valid Websocket Request",
      );
    }
  };

  // run in a block to not hold borrow to `inspector_map` for too long
  let (dispatch_tx, outbound_rx) = {
    let mut map = inspector_map.borrow_mut();
    let Some(info) = map.get_mut(&uuid) else {
      return text_response(StatusCode::NOT_FOUND, "Invalid inspector UUID");
    };
    let Some(outbound_rx) = info.outbound_rx.take() else {
      return text_response(
        StatusCode::CONFLICT,
        "A debugger is already connected to this inspector",
      );
    };
    (info.dispatch_tx.clone(), outbound_rx)
  };

  // wait for the upgrade in a task, then pump messages between the socket
  // and the session
  tokio::task::spawn_local(async move {
    let outbound_rx = match hyper::upgrade::on(req).await {
      Ok(upgraded) => {
        let websocket =
          WebSocketStream::from_raw_socket(upgraded, Role::Server, None).await;
        eprintln!("Debugger session started.");
        pump_websocket_messages(websocket, dispatch_tx, outbound_rx).await
      }
      Err(err) => {
        eprintln!("Inspector server failed to upgrade to WS connection: {err}");
        outbound_rx
      }
    };
    // Allow the debugger to reconnect.
    if let Some(info) = inspector_map.borrow_mut().get_mut(&uuid) {
      info.outbound_rx = Some(outbound_rx);
    }
  });

  Response::builder()
    .status(StatusCode::SWITCHING_PROTOCOLS)
    .header(header::CONNECTION, "Upgrade")
    .header(header::UPGRADE, "websocket")
    .header(header::SEC_WEBSOCKET_ACCEPT, accept_key)
    .body(Body::empty())
}

fn json_version_response(name: &str) -> Value {
  #[allow(unused_mut)]
  let mut response = json!({
    "Browser": name,
    "Protocol-Version": "1.3",
  });
  #[cfg(feature = "v8")]
  {
    response["V8-Version"] = json!(v8::V8::get_version());
  }
  response
}

async fn server(
  listener: std::net::TcpListener,
  register_inspector_rx: UnboundedReceiver<InspectorInfo>,
  shutdown_server_rx: oneshot::Receiver<()>,
  ready_tx: oneshot::Sender<Result<(), InspectorError>>,
  name: &'static str,
) {
  let inspector_map_: InspectorMap = Default::default();

  let inspector_map = Rc::clone(&inspector_map_);
  let mut register_inspector_handler = pin!(
    register_inspector_rx
      .map(|info| {
        eprintln!(
          "Debugger listening on {}",
          info.get_websocket_debugger_url(&info.host.to_string())
        );
        eprintln!("Visit chrome://inspect to connect to the debugger.");
        if info.wait_for_session {
          eprintln!("Waiting for debugger to connect.");
        }
        if inspector_map.borrow_mut().insert(info.uuid, info).is_some() {
          panic!("Inspector UUID already in map");
        }
      })
      .collect::<()>()
  );

  let inspector_map = Rc::clone(&inspector_map_);
  let mut deregister_inspector_handler = pin!(
    future::poll_fn(|cx| {
      inspector_map.borrow_mut().retain(|uuid, info| {
        let alive = info.deregister_rx.poll_unpin(cx) == Poll::Pending;
        if !alive {
          debug!("Inspector {} deregistered", uuid);
        }
        alive
      });
      Poll::<Infallible>::Pending
    })
    .fuse()
  );

  let json_version_response = json_version_response(name);

  let make_svc = hyper::service::make_service_fn(|_| {
    let inspector_map = Rc::clone(&inspector_map_);
    let json_version_response = json_version_response.clone();

    future::ok::<_, Infallible>(hyper::service::service_fn(
      move |req: Request<Body>| {
        future::ready(handle_request(
          req,
          Rc::clone(&inspector_map),
          &json_version_response,
        ))
      },
    ))
  });

  // Created inside the runtime so the listener registers with its reactor.
  let builder = match hyper::Server::from_tcp(listener) {
    Ok(builder) => {
      let _ = ready_tx.send(Ok(()));
      builder
    }
    Err(err) => {
      let _ = ready_tx.send(Err(err.into()));
      return;
    }
  };
  let mut server_handler = pin!(
    builder
      .executor(LocalExecutor)
      .serve(make_svc)
      .with_graceful_shutdown(async {
        shutdown_server_rx.await.ok();
      })
      .unwrap_or_else(|err| {
        eprintln!("Inspector server stopped: {err}.");
      })
      .fuse()
  );

  select! {
    _ = register_inspector_handler => {},
    _ = deregister_inspector_handler => unreachable!(),
    _ = server_handler => {},
  }
}

/// Forwards messages between the websocket and the session channels until
/// either side disconnects, ignoring errors. Returns the outbound receiver
/// so a later connection can take it over.
///
/// Unbounded `futures` channels are used on purpose: they don't take part
/// in tokio's cooperative budgeting, which matters when the isolate thread
/// is parked in the pause loop.
async fn pump_websocket_messages(
  websocket: WebSocketStream<hyper::upgrade::Upgraded>,
  inbound_tx: UnboundedSender<String>,
  mut outbound_rx: UnboundedReceiver<InspectorMsg>,
) -> UnboundedReceiver<InspectorMsg> {
  let (mut websocket_tx, mut websocket_rx) = websocket.split();
  'pump: loop {
    tokio::select! {
      maybe_msg = outbound_rx.next() => {
        let Some(msg) = maybe_msg else {
          break 'pump;
        };
        let frame = tungstenite::Message::Text(msg.content);
        if websocket_tx.send(frame).await.is_err() {
          break 'pump;
        }
      }
      maybe_frame = websocket_rx.next() => {
        match maybe_frame {
          Some(Ok(tungstenite::Message::Text(text))) => {
            let _ = inbound_tx.unbounded_send(text);
          }
          Some(Ok(tungstenite::Message::Close(_))) | Some(Err(_)) | None => {
            // Users don't care if there was an error coming from debugger,
            // just about the fact that debugger did disconnect.
            eprintln!("Debugger session ended");
            break 'pump;
          }
          Some(Ok(_)) => {
            // Ignore other messages.
          }
        }
      }
    }
  }
  outbound_rx
}

/// Inspector information that is sent from the isolate thread to the server
/// thread when a session is registered.
pub struct InspectorInfo {
  pub host: SocketAddr,
  pub uuid: Uuid,
  pub thread_name: Option<String>,
  pub dispatch_tx: UnboundedSender<String>,
  outbound_rx: Option<UnboundedReceiver<InspectorMsg>>,
  pub deregister_rx: oneshot::Receiver<()>,
  pub url: String,
  pub wait_for_session: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetMetadata {
  description: &'static str,
  devtools_frontend_url: String,
  favicon_url: &'static str,
  id: String,
  title: String,
  #[serde(rename = "type")]
  kind: &'static str,
  url: String,
  web_socket_debugger_url: String,
}

impl InspectorInfo {
  pub fn new(
    host: SocketAddr,
    dispatch_tx: UnboundedSender<String>,
    outbound_rx: UnboundedReceiver<InspectorMsg>,
    deregister_rx: oneshot::Receiver<()>,
    url: String,
    wait_for_session: bool,
  ) -> Self {
    Self {
      host,
      uuid: Uuid::new_v4(),
      thread_name: thread::current().name().map(|n| n.to_owned()),
      dispatch_tx,
      outbound_rx: Some(outbound_rx),
      deregister_rx,
      url,
      wait_for_session,
    }
  }

  /// Whether a debugger currently holds the websocket of this session.
  pub fn is_connected(&self) -> bool {
    self.outbound_rx.is_none()
  }

  fn get_json_metadata(&self, host: &Option<String>) -> Value {
    let host_listen = self.host.to_string();
    let host = host.as_deref().unwrap_or(&host_listen);
    let metadata = TargetMetadata {
      description: "deno",
      devtools_frontend_url: self.get_frontend_url(host),
      favicon_url: "https://deno.land/favicon.ico",
      id: self.uuid.to_string(),
      title: self.get_title(),
      kind: "node",
      url: self.url.clone(),
      web_socket_debugger_url: self.get_websocket_debugger_url(host),
    };
    json!(metadata)
  }

  pub fn get_websocket_debugger_url(&self, host: &str) -> String {
    format!("ws://{}/ws/{}", host, self.uuid)
  }

  fn get_frontend_url(&self, host: &str) -> String {
    format!(
      "devtools://devtools/bundled/js_app.html?ws={}/ws/{}&experiments=true&v8only=true",
      host, self.uuid
    )
  }

  fn get_title(&self) -> String {
    match &self.thread_name {
      Some(thread_name) => {
        format!("deno - {} [pid: {}]", thread_name, process::id())
      }
      None => format!("deno [pid: {}]", process::id()),
    }
  }
}
