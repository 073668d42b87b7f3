//! TCP server exposing the backend
//!
//! Each connection carries a sequence of requests; every request gets
//! exactly one response with the same request id. Backend calls block on
//! SQLite and argon2, so they run on the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use fleetflow_core::{Backend, Error as CoreError};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Operation, Reply, Request, Response};

/// Server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind `addr` and start accepting connections
    pub async fn start(addr: SocketAddr, backend: Arc<Backend>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(accept_loop(listener, backend, shutdown_tx.clone()));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and close every open connection
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    backend: Arc<Backend>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            backend.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    backend: Arc<Backend>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    loop {
        tokio::select! {
            result = read_frame::<Request, _>(&mut reader) => {
                if !serve_frame(result, &backend, &mut writer, addr).await {
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        }
    }

    debug!(addr = %addr, "Connection closed");
}

/// Answer one frame; returns whether the connection stays open
async fn serve_frame(
    frame: Result<Request>,
    backend: &Arc<Backend>,
    writer: &mut WriteHalf<TcpStream>,
    addr: SocketAddr,
) -> bool {
    let response = match frame {
        Ok(request) => handle_request(backend.clone(), request).await,
        Err(Error::ConnectionClosed) => return false,
        Err(Error::Protocol(reason)) => {
            // Framing is still intact, so tell the client before hanging up
            warn!(addr = %addr, reason = %reason, "Malformed request");
            let _ = write_frame(writer, &Response::malformed(reason)).await;
            return false;
        }
        Err(e) => {
            warn!(addr = %addr, error = %e, "Read error");
            return false;
        }
    };

    if let Err(e) = write_frame(writer, &response).await {
        debug!(addr = %addr, error = %e, "Write failed");
        return false;
    }
    true
}

async fn handle_request(backend: Arc<Backend>, request: Request) -> Response {
    let request_id = request.request_id;
    let op = request.op.name();

    match tokio::task::spawn_blocking(move || dispatch(&backend, &request)).await {
        Ok(response) => response,
        Err(e) => {
            let err = CoreError::Upstream(format!("{} handler failed: {}", op, e));
            Response::from_error(request_id, &err)
        }
    }
}

/// Run one request against the backend
pub fn dispatch(backend: &Backend, request: &Request) -> Response {
    let bearer = request.bearer.as_deref();
    debug!(request_id = %request.request_id, op = request.op.name(), "Dispatching request");

    let result = match &request.op {
        Operation::Ping => Ok(Reply::Pong),
        Operation::SignIn { email, password } => {
            backend.sign_in(email, password).map(|session| Reply::SignedIn {
                token: session.token,
                account_id: session.account_id,
                expires_at: session.expires_at,
            })
        }
        Operation::SignOut => backend.sign_out(bearer).map(|_| Reply::SignedOut),
        Operation::IssueInvite(issue) => backend
            .issue_invite(bearer, issue)
            .map(Reply::InviteIssued),
        Operation::PreviewInvite { token } => {
            backend.preview_invite(token).map(Reply::InvitePreview)
        }
        Operation::RedeemInvite(redeem) => backend.redeem_invite(redeem).map(Reply::Redeemed),
        Operation::ListMembers { company_id, role } => backend
            .list_members(bearer, *company_id, *role)
            .map(|members| Reply::Members { members }),
        Operation::SetMemberStatus {
            company_id,
            profile_id,
            status,
        } => backend
            .set_member_status(bearer, *company_id, *profile_id, *status)
            .map(Reply::MemberUpdated),
        Operation::ListInvitations { company_id } => backend
            .list_invitations(bearer, *company_id)
            .map(|invitations| Reply::Invitations { invitations }),
    };

    match result {
        Ok(reply) => Response::ok(request.request_id, reply),
        Err(e) => Response::from_error(request.request_id, &e),
    }
}
