//! The closed set of packet bodies and the static pairing of each request
//! with the response kind that must answer it.

use std::fmt;

use vfuse_serde::{WireDeserialize, WireSerialize};
use vfuse_types::RequestId;

use crate::messages::*;

/// A request whose reply is statically known.
///
/// [`Call::response_from`] is how the caller checks that the body delivered
/// for its id is the right kind; a mismatch hands the body back unchanged.
pub trait Call: Into<Body> + fmt::Debug + Send + 'static {
    type Response: Reply + fmt::Debug + Send + 'static;

    /// Operation name used in logs.
    const NAME: &'static str;

    /// Name of the body variant that answers this request.
    const RESPONSE_NAME: &'static str;

    fn response_from(body: Body) -> Result<Self::Response, Body>;
}

/// Common view over every response kind.
pub trait Reply {
    fn remote_error(&self) -> Option<&RemoteError>;
}

macro_rules! define_body {
    ($( $op:literal: $req:ident => $rsp:ident ),* $(,)?) => {
        /// Tagged union of every message kind. Each request kind is
        /// immediately followed by its response kind, which fixes the wire
        /// tags: request `2n`, response `2n + 1`.
        #[derive(Debug, Clone, PartialEq, Eq, WireSerialize, WireDeserialize)]
        pub enum Body {
            $( $req($req), $rsp($rsp), )*
        }

        impl Body {
            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        Body::$req(_) => stringify!($req),
                        Body::$rsp(_) => stringify!($rsp),
                    )*
                }
            }
        }

        $(
            impl From<$req> for Body {
                fn from(v: $req) -> Self {
                    Body::$req(v)
                }
            }

            impl From<$rsp> for Body {
                fn from(v: $rsp) -> Self {
                    Body::$rsp(v)
                }
            }

            impl Call for $req {
                type Response = $rsp;
                const NAME: &'static str = $op;
                const RESPONSE_NAME: &'static str = stringify!($rsp);

                fn response_from(body: Body) -> Result<$rsp, Body> {
                    match body {
                        Body::$rsp(rsp) => Ok(rsp),
                        other => Err(other),
                    }
                }
            }

            impl Reply for $rsp {
                fn remote_error(&self) -> Option<&RemoteError> {
                    self.err.as_ref()
                }
            }
        )*
    };
}

define_body! {
    "attr": AttrReq => AttrRsp,
    "open": OpenReq => OpenRsp,
    "close": CloseReq => CloseRsp,
    "read": ReadReq => ReadRsp,
    "readdir": ReaddirReq => ReaddirRsp,
    "readlink": ReadlinkReq => ReadlinkRsp,
    "rename": RenameReq => RenameRsp,
    "mkdir": MkdirReq => MkdirRsp,
    "rmdir": RmdirReq => RmdirRsp,
    "symlink": SymlinkReq => SymlinkRsp,
    "unlink": UnlinkReq => UnlinkRsp,
    "truncate": TruncateReq => TruncateRsp,
    "chmod": ChmodReq => ChmodRsp,
    "utime": UtimeReq => UtimeRsp,
    "mknod": MknodReq => MknodRsp,
}

/// One unit on the wire: a correlation id and a body.
#[derive(Debug, Clone, PartialEq, Eq, WireSerialize, WireDeserialize)]
pub struct Packet {
    pub id: RequestId,
    pub body: Body,
}

impl Packet {
    pub fn new(id: RequestId, body: impl Into<Body>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }
}
