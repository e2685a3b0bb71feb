#![allow(dead_code)]

use commission_link::{
    api::{ApiError, ApiResponse, LinkRequest, RecordApi},
    credentials::Credentials,
    input::RunInput,
};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;

pub fn creds() -> Credentials {
    Credentials::from_parts(
        Some("test_key".into()),
        Some("test_business".into()),
        Some("test_user".into()),
    )
    .expect("complete credentials")
}

pub enum Reply {
    Status(u16, &'static str),
    Fail(&'static str),
}

/// Record API double: answers per commission id and remembers every call.
pub struct FakeApi {
    replies: HashMap<String, Reply>,
    default_status: u16,
    pub calls: RefCell<Vec<LinkRequest>>,
}

impl FakeApi {
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            replies: HashMap::new(),
            default_status: status,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn reply(mut self, commission_id: &str, reply: Reply) -> Self {
        self.replies.insert(commission_id.to_string(), reply);
        self
    }

    pub fn call_ids(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.commission_id.clone())
            .collect()
    }
}

impl RecordApi for FakeApi {
    fn update_record(&self, _creds: &Credentials, req: &LinkRequest) -> Result<ApiResponse, ApiError> {
        self.calls.borrow_mut().push(req.clone());
        match self.replies.get(&req.commission_id) {
            Some(Reply::Status(status, body)) => Ok(ApiResponse {
                status: *status,
                body: body.to_string(),
            }),
            Some(Reply::Fail(msg)) => Err(ApiError::Url(msg.to_string())),
            None => Ok(ApiResponse {
                status: self.default_status,
                body: String::new(),
            }),
        }
    }
}

pub fn plan(id: &str, policy: &str) -> serde_json::Value {
    json!({
        "commission_id": id,
        "commission_object_id": "obj_commission",
        "policy_object_id": policy,
        "link_field_id_on_commission": "field_policy_link",
    })
}

pub fn three_plans() -> serde_json::Value {
    json!({
        "ok": true,
        "ready_to_link": ["comm_001", "comm_002", "comm_003"],
        "planned_links": [
            plan("comm_001", "policy_001"),
            plan("comm_002", "policy_002"),
            plan("comm_003", "policy_003"),
        ],
    })
}

pub fn c1_c2() -> serde_json::Value {
    json!({
        "ready_to_link": ["c1", "c2"],
        "planned_links": [{
            "commission_id": "c1",
            "commission_object_id": "OBJ",
            "policy_object_id": "P1",
            "link_field_id_on_commission": "F1",
        }],
    })
}

pub fn run_input(doc: &serde_json::Value) -> RunInput {
    RunInput::from_document(doc).expect("valid run input")
}
