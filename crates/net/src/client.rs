//! TCP client for a FleetFlow server
//!
//! One request in flight at a time over a single connection. After a
//! successful sign-in the client attaches the bearer to every request.

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;

use fleetflow_core::{
    AccountSummary, InvitationSummary, InvitePreview, IssueInviteRequest, IssuedInvite, Profile,
    ProfileStatus, RedeemInviteRequest, Role,
};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Operation, Reply, Request, Response};

/// Client handle for network operations
pub struct Client {
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
    bearer: Option<String>,
}

fn unexpected(reply: Reply) -> Error {
    Error::Protocol(format!("Unexpected reply: {}", reply.kind()))
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        Ok(Self {
            reader,
            writer,
            bearer: None,
        })
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn set_bearer(&mut self, bearer: Option<String>) {
        self.bearer = bearer;
    }

    /// Send one operation and wait for its reply
    pub async fn call(&mut self, op: Operation) -> Result<Reply> {
        let request = Request::new(self.bearer.clone(), op);
        debug!(request_id = %request.request_id, op = request.op.name(), "Sending request");

        write_frame(&mut self.writer, &request).await?;
        let response: Response = read_frame(&mut self.reader).await?;

        if response.request_id != request.request_id {
            return Err(Error::Protocol(format!(
                "Response {} does not match request {}",
                response.request_id, request.request_id
            )));
        }

        response.into_result()
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.call(Operation::Ping).await? {
            Reply::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Sign in and keep the returned bearer for later calls
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Uuid> {
        let op = Operation::SignIn {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.call(op).await? {
            Reply::SignedIn {
                token, account_id, ..
            } => {
                self.bearer = Some(token);
                Ok(account_id)
            }
            other => Err(unexpected(other)),
        }
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        match self.call(Operation::SignOut).await? {
            Reply::SignedOut => {
                self.bearer = None;
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }

    pub async fn issue_invite(&mut self, request: IssueInviteRequest) -> Result<IssuedInvite> {
        match self.call(Operation::IssueInvite(request)).await? {
            Reply::InviteIssued(issued) => Ok(issued),
            other => Err(unexpected(other)),
        }
    }

    pub async fn preview_invite(&mut self, token: &str) -> Result<InvitePreview> {
        let op = Operation::PreviewInvite {
            token: token.to_string(),
        };
        match self.call(op).await? {
            Reply::InvitePreview(preview) => Ok(preview),
            other => Err(unexpected(other)),
        }
    }

    pub async fn redeem_invite(&mut self, request: RedeemInviteRequest) -> Result<AccountSummary> {
        match self.call(Operation::RedeemInvite(request)).await? {
            Reply::Redeemed(summary) => Ok(summary),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_members(
        &mut self,
        company_id: Uuid,
        role: Option<Role>,
    ) -> Result<Vec<Profile>> {
        match self.call(Operation::ListMembers { company_id, role }).await? {
            Reply::Members { members } => Ok(members),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_member_status(
        &mut self,
        company_id: Uuid,
        profile_id: Uuid,
        status: ProfileStatus,
    ) -> Result<Profile> {
        let op = Operation::SetMemberStatus {
            company_id,
            profile_id,
            status,
        };
        match self.call(op).await? {
            Reply::MemberUpdated(profile) => Ok(profile),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_invitations(&mut self, company_id: Uuid) -> Result<Vec<InvitationSummary>> {
        match self.call(Operation::ListInvitations { company_id }).await? {
            Reply::Invitations { invitations } => Ok(invitations),
            other => Err(unexpected(other)),
        }
    }
}
