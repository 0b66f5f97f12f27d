//! API I/O task: reactor-driven accept and service loops.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! scheduling and `async-io-mini` timers (no busy-spinning). Two
//! concurrent futures share the server through `Rc<RefCell<..>>`:
//!
//! 1. **Accept** drains the non-blocking listener every 50ms
//! 2. **Service** runs one `ApiServer::service` pass plus log forwarding
//!    every `loop_interval_ms`
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────┐
//!  │  API Thread                                          │
//!  │  ┌────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::block_on                        │  │
//!  │  │  ┌──────────────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor            │  │  │
//!  │  │  │   ┌─────────┐      ┌──────────────────┐  │  │  │
//!  │  │  │   │ Accept  │      │ Service + logs   │  │  │  │
//!  │  │  │   │ 50ms ⏱  │      │ loop_interval ⏱ │  │  │  │
//!  │  │  │   └─────────┘      └──────────────────┘  │  │  │
//!  │  │  └──────────────────────────────────────────┘  │  │
//!  │  └────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────┘
//! ```

use core::cell::RefCell;
use core::time::Duration;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::rc::Rc;

use log::{error, info, warn};

use crate::adapters::tcp_transport::TcpTransport;
use crate::adapters::time::MonotonicClock;
use crate::app::ports::{Clock, DevicePort, NetworkPort};
use crate::config::ApiConfig;

use super::server::ApiServer;

const ACCEPT_INTERVAL_MS: u64 = 50;

/// Software send window per client socket.
const SEND_WINDOW: usize = 2048;

type SharedServer = Rc<RefCell<ApiServer<TcpTransport>>>;

/// Accept task, polled every 50ms.
async fn accept_loop(listener: TcpListener, server: SharedServer, clock: MonotonicClock) {
    loop {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => match TcpTransport::new(stream, addr, SEND_WINDOW) {
                    Ok(transport) => {
                        server.borrow_mut().accept(transport, clock.now_ms());
                    }
                    Err(e) => warn!("API: cannot configure socket for {}: {}", addr, e),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("API: accept failed: {}", e);
                    break;
                }
            }
        }
        async_io_mini::Timer::after(Duration::from_millis(ACCEPT_INTERVAL_MS)).await;
    }
}

/// Service task: drives every connection once per period.
async fn service_loop<D, N>(
    server: SharedServer,
    mut device: D,
    network: N,
    clock: MonotonicClock,
    period: Duration,
) where
    D: DevicePort,
    N: NetworkPort,
{
    loop {
        {
            let mut s = server.borrow_mut();
            s.service(clock.now_ms(), &mut device, network.is_connected());
            s.forward_logs();
        }
        async_io_mini::Timer::after(period).await;
    }
}

/// Run the API on the current thread. Never returns unless the listener
/// cannot be made non-blocking.
pub fn run<D, N>(listener: TcpListener, server: ApiServer<TcpTransport>, device: D, network: N)
where
    D: DevicePort + 'static,
    N: NetworkPort + 'static,
{
    if let Err(e) = listener.set_nonblocking(true) {
        error!("API: listener setup failed: {}", e);
        return;
    }

    let clock = MonotonicClock::new();
    let period = Duration::from_millis(u64::from(server.config().loop_interval_ms));
    let max_clients = server.config().max_clients;
    let server: SharedServer = Rc::new(RefCell::new(server));

    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    executor
        .spawn(accept_loop(listener, server.clone(), clock))
        .detach();
    executor
        .spawn(service_loop(server, device, network, clock, period))
        .detach();

    info!(
        "API task started ({} ms loop, {} max clients)",
        period.as_millis(),
        max_clients
    );

    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

// ── Thread spawn ─────────────────────────────────────────────

/// Spawn the API in its own thread. The server is built on that thread;
/// connections hold non-`Send` image sources.
pub fn spawn<D, N>(
    listener: TcpListener,
    config: ApiConfig,
    server_info: String,
    device: D,
    network: N,
) -> crate::error::Result<std::thread::JoinHandle<()>>
where
    D: DevicePort + Send + 'static,
    N: NetworkPort + Send + 'static,
{
    config.validate()?;
    std::thread::Builder::new()
        .name("api-io".into())
        .stack_size(16 * 1024)
        .spawn(move || match ApiServer::new(config, server_info) {
            Ok(server) => run(listener, server, device, network),
            Err(e) => error!("API: {}", e),
        })
        .map_err(|_| crate::error::Error::Config("cannot spawn API thread"))
}

// ── Tests ────────────────────────────────────────────────────
