//! Method catalog of the uptime actor.

use std::fmt;

use crate::error::LedgerError;
use crate::types::{NodeInfoPayload, ReportPayload};

/// Method numbers understood by the uptime actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Register = 2,
    NewMember = 3,
    EditChecker = 4,
    EditMember = 5,
    RemoveChecker = 6,
    RemoveMember = 7,
    ReportChecker = 8,
}

impl Method {
    pub fn number(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Register => "register",
            Method::NewMember => "new_member",
            Method::EditChecker => "edit_checker",
            Method::EditMember => "edit_member",
            Method::RemoveChecker => "remove_checker",
            Method::RemoveMember => "remove_member",
            Method::ReportChecker => "report_checker",
        };
        write!(f, "{}({})", name, self.number())
    }
}

/// A method call on the uptime actor together with its params
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Register the sender as a checker
    Register(NodeInfoPayload),
    NewMember(NodeInfoPayload),
    EditChecker(NodeInfoPayload),
    EditMember(NodeInfoPayload),
    RemoveChecker,
    RemoveMember,
    /// Cast an offline vote against a checker
    ReportChecker(ReportPayload),
}

impl Transaction {
    pub fn method(&self) -> Method {
        match self {
            Transaction::Register(_) => Method::Register,
            Transaction::NewMember(_) => Method::NewMember,
            Transaction::EditChecker(_) => Method::EditChecker,
            Transaction::EditMember(_) => Method::EditMember,
            Transaction::RemoveChecker => Method::RemoveChecker,
            Transaction::RemoveMember => Method::RemoveMember,
            Transaction::ReportChecker(_) => Method::ReportChecker,
        }
    }

    /// JSON encoded params; removals carry none
    pub fn params(&self) -> Result<Vec<u8>, LedgerError> {
        let params = match self {
            Transaction::Register(payload)
            | Transaction::NewMember(payload)
            | Transaction::EditChecker(payload)
            | Transaction::EditMember(payload) => serde_json::to_vec(payload)?,
            Transaction::RemoveChecker | Transaction::RemoveMember => Vec::new(),
            Transaction::ReportChecker(payload) => serde_json::to_vec(payload)?,
        };
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActorId, MultiAddr, PeerId};

    #[test]
    fn test_method_numbers() {
        assert_eq!(Method::Register.number(), 2);
        assert_eq!(Method::NewMember.number(), 3);
        assert_eq!(Method::EditChecker.number(), 4);
        assert_eq!(Method::EditMember.number(), 5);
        assert_eq!(Method::RemoveChecker.number(), 6);
        assert_eq!(Method::RemoveMember.number(), 7);
        assert_eq!(Method::ReportChecker.number(), 8);
    }

    #[test]
    fn test_report_params() {
        let tx = Transaction::ReportChecker(ReportPayload { checker: ActorId::new(42) });

        assert_eq!(tx.method(), Method::ReportChecker);
        assert_eq!(tx.params().unwrap(), br#"{"checker":42}"#.to_vec());
    }

    #[test]
    fn test_node_params() {
        let tx = Transaction::EditMember(NodeInfoPayload {
            id: PeerId::new("peer"),
            addresses: vec![MultiAddr::from("/ip4/1.2.3.4/tcp/80")],
        });

        let params: serde_json::Value = serde_json::from_slice(&tx.params().unwrap()).unwrap();
        assert_eq!(params["id"], "peer");
        assert_eq!(params["addresses"][0], "/ip4/1.2.3.4/tcp/80");
        assert_eq!(tx.method().to_string(), "edit_member(5)");
    }

    #[test]
    fn test_removal_has_no_params() {
        assert!(Transaction::RemoveChecker.params().unwrap().is_empty());
        assert!(Transaction::RemoveMember.params().unwrap().is_empty());
    }
}
