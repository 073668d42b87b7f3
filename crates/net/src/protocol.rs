//! Network protocol message types
//!
//! Every request carries an id that the matching response echoes, an
//! optional bearer credential, and one operation. All messages are
//! JSON-serialized and length-prefixed on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use fleetflow_core::{
    AccountSummary, Error as CoreError, ErrorKind, InvitationSummary, InvitePreview,
    IssueInviteRequest, IssuedInvite, Profile, ProfileStatus, RedeemInviteRequest, Role,
};

/// Client request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    #[serde(flatten)]
    pub op: Operation,
}

impl Request {
    pub fn new(bearer: Option<String>, op: Operation) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            bearer,
            op,
        }
    }
}

/// Operations a client can ask for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Operation {
    Ping,

    SignIn {
        email: String,
        password: String,
    },

    SignOut,

    IssueInvite(IssueInviteRequest),

    /// Unauthenticated; the token is the credential
    PreviewInvite {
        token: String,
    },

    /// Unauthenticated; the token is the credential
    RedeemInvite(RedeemInviteRequest),

    ListMembers {
        company_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
    },

    SetMemberStatus {
        company_id: Uuid,
        profile_id: Uuid,
        status: ProfileStatus,
    },

    ListInvitations {
        company_id: Uuid,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::SignIn { .. } => "sign_in",
            Operation::SignOut => "sign_out",
            Operation::IssueInvite(_) => "issue_invite",
            Operation::PreviewInvite { .. } => "preview_invite",
            Operation::RedeemInvite(_) => "redeem_invite",
            Operation::ListMembers { .. } => "list_members",
            Operation::SetMemberStatus { .. } => "set_member_status",
            Operation::ListInvitations { .. } => "list_invitations",
        }
    }
}

/// Server response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: Uuid,
    /// HTTP-equivalent status
    pub status: u16,
    #[serde(flatten)]
    pub reply: Reply,
}

impl Response {
    pub fn ok(request_id: Uuid, reply: Reply) -> Self {
        Self {
            request_id,
            status: reply.status(),
            reply,
        }
    }

    /// Error reply for a failed operation. Upstream detail is logged here
    /// and replaced with a generic message.
    pub fn from_error(request_id: Uuid, err: &CoreError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Upstream {
            error!(request_id = %request_id, error = %err, "Upstream failure");
        }

        Self {
            request_id,
            status: kind.status(),
            reply: Reply::Error(ErrorBody {
                code: err.code().to_string(),
                message: err.user_message(),
            }),
        }
    }

    /// Reply for a frame that could not be parsed as a request
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::nil(),
            status: 400,
            reply: Reply::Error(ErrorBody {
                code: "malformed_request".into(),
                message: message.into(),
            }),
        }
    }

    /// Split into the reply or the error it carries
    pub fn into_result(self) -> crate::Result<Reply> {
        match self.reply {
            Reply::Error(body) => Err(crate::Error::Api {
                status: self.status,
                code: body.code,
                message: body.message,
            }),
            reply => Ok(reply),
        }
    }
}

/// Error reply body; never carries upstream detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Reply {
    Pong,

    SignedIn {
        token: String,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    SignedOut,

    InviteIssued(IssuedInvite),

    InvitePreview(InvitePreview),

    Redeemed(AccountSummary),

    Members {
        members: Vec<Profile>,
    },

    MemberUpdated(Profile),

    Invitations {
        invitations: Vec<InvitationSummary>,
    },

    Error(ErrorBody),
}

impl Reply {
    fn status(&self) -> u16 {
        match self {
            Reply::InviteIssued(_) | Reply::Redeemed(_) => 201,
            _ => 200,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Pong => "pong",
            Reply::SignedIn { .. } => "signed_in",
            Reply::SignedOut => "signed_out",
            Reply::InviteIssued(_) => "invite_issued",
            Reply::InvitePreview(_) => "invite_preview",
            Reply::Redeemed(_) => "redeemed",
            Reply::Members { .. } => "members",
            Reply::MemberUpdated(_) => "member_updated",
            Reply::Invitations { .. } => "invitations",
            Reply::Error(_) => "error",
        }
    }
}
