//! Typed action catalog.
//!
//! Every cross-service operation the model may invoke is one variant of the
//! closed [`Action`] enum, carrying a typed parameter struct from
//! [`params`]. The catalog table below is the single source for each
//! action's tool name, owning resource, operation kind, description and
//! parameter schema.
//!
//! # Request mapping
//!
//! Actions map onto the owning backend service's REST surface:
//!
//! | Operation | Method | Path | Payload |
//! |-----------|--------|------|---------|
//! | create | `POST` | `/{resource}` | JSON body |
//! | update | `PATCH` | `/{resource}/{id}` | JSON body without `id` |
//! | list | `GET` | `/{resource}` | query string |
//! | get | `GET` | `/{resource}/{id}` | none |
//!
//! Outcomes are normalized into the [`ActionResult`] envelope.

pub mod params;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::chat::ToolSpec;
use crate::models::Identity;
use params::*;

/// Backend service that owns a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Project,
    Client,
    Workforce,
    Communication,
    Knowledge,
    Notification,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Project,
        Service::Client,
        Service::Workforce,
        Service::Communication,
        Service::Knowledge,
        Service::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Project => "project",
            Service::Client => "client",
            Service::Workforce => "workforce",
            Service::Communication => "communication",
            Service::Knowledge => "knowledge",
            Service::Notification => "notification",
        }
    }
}

/// Tool grouping used by `enabledToolCategories`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Projects,
    Clients,
    Workforce,
    Communication,
    Knowledge,
    Notifications,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Projects => "projects",
            ToolCategory::Clients => "clients",
            ToolCategory::Workforce => "workforce",
            ToolCategory::Communication => "communication",
            ToolCategory::Knowledge => "knowledge",
            ToolCategory::Notifications => "notifications",
        }
    }

    pub fn parse(s: &str) -> Option<ToolCategory> {
        match s.trim().to_ascii_lowercase().as_str() {
            "projects" => Some(ToolCategory::Projects),
            "clients" => Some(ToolCategory::Clients),
            "workforce" => Some(ToolCategory::Workforce),
            "communication" => Some(ToolCategory::Communication),
            "knowledge" => Some(ToolCategory::Knowledge),
            "notifications" => Some(ToolCategory::Notifications),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Projects,
    Tasks,
    Milestones,
    Clients,
    Proposals,
    Teams,
    Members,
    Skills,
    Channels,
    Messages,
    Documents,
    WikiPages,
    Notifications,
}

impl Resource {
    /// URL path segment on the owning service.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Tasks => "tasks",
            Resource::Milestones => "milestones",
            Resource::Clients => "clients",
            Resource::Proposals => "proposals",
            Resource::Teams => "teams",
            Resource::Members => "members",
            Resource::Skills => "skills",
            Resource::Channels => "channels",
            Resource::Messages => "messages",
            Resource::Documents => "documents",
            Resource::WikiPages => "wiki-pages",
            Resource::Notifications => "notifications",
        }
    }

    pub fn service(&self) -> Service {
        match self {
            Resource::Projects | Resource::Tasks | Resource::Milestones => Service::Project,
            Resource::Clients | Resource::Proposals => Service::Client,
            Resource::Teams | Resource::Members | Resource::Skills => Service::Workforce,
            Resource::Channels | Resource::Messages => Service::Communication,
            Resource::Documents | Resource::WikiPages => Service::Knowledge,
            Resource::Notifications => Service::Notification,
        }
    }

    pub fn category(&self) -> ToolCategory {
        match self.service() {
            Service::Project => ToolCategory::Projects,
            Service::Client => ToolCategory::Clients,
            Service::Workforce => ToolCategory::Workforce,
            Service::Communication => ToolCategory::Communication,
            Service::Knowledge => ToolCategory::Knowledge,
            Service::Notification => ToolCategory::Notifications,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    List,
    Get,
}

impl Operation {
    /// Reads are safe to retry; writes are not.
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::List | Operation::Get)
    }
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub resource: Resource,
    pub operation: Operation,
    schema: fn() -> Value,
}

impl ActionSpec {
    pub fn category(&self) -> ToolCategory {
        self.resource.category()
    }

    pub fn schema(&self) -> Value {
        (self.schema)()
    }

    pub fn tool_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.schema(),
        }
    }
}

/// Failure to turn a model's tool call into an [`Action`].
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

macro_rules! action_catalog {
    ($(
        $variant:ident($params:ty) => $name:literal, $method:ident, $resource:ident, $op:ident,
            $desc:literal;
    )*) => {
        /// One cross-service operation with its typed parameters.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Action {
            $( $variant($params), )*
        }

        impl Action {
            /// Tool name as exposed to the model.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Action::$variant(_) => $name, )*
                }
            }

            pub fn resource(&self) -> Resource {
                match self {
                    $( Action::$variant(_) => Resource::$resource, )*
                }
            }

            pub fn operation(&self) -> Operation {
                match self {
                    $( Action::$variant(_) => Operation::$op, )*
                }
            }

            /// Decode a model tool call by name and JSON arguments.
            pub fn decode(name: &str, arguments: Value) -> Result<Action, DecodeError> {
                // Models sometimes send `null` for an empty argument object.
                let arguments = if arguments.is_null() {
                    Value::Object(Map::new())
                } else {
                    arguments
                };
                match name {
                    $(
                        $name => serde_json::from_value::<$params>(arguments)
                            .map(Action::$variant)
                            .map_err(|e| DecodeError::InvalidArguments {
                                tool: name.to_string(),
                                message: e.to_string(),
                            }),
                    )*
                    other => Err(DecodeError::UnknownTool(other.to_string())),
                }
            }

            fn params_value(&self) -> Value {
                let value = match self {
                    $( Action::$variant(p) => serde_json::to_value(p), )*
                };
                // Plain structs of strings/numbers always serialize.
                value.unwrap_or(Value::Object(Map::new()))
            }
        }

        static CATALOG: &[ActionSpec] = &[
            $(
                ActionSpec {
                    name: $name,
                    description: $desc,
                    resource: Resource::$resource,
                    operation: Operation::$op,
                    schema: <$params as ParamSchema>::schema,
                },
            )*
        ];

        /// Client for the backend services: one typed method per operation.
        ///
        /// Implementors provide [`ActionGateway::execute`]; every outcome,
        /// including transport failures and timeouts, comes back as an
        /// [`ActionResult`] rather than an error.
        #[async_trait]
        pub trait ActionGateway: Send + Sync {
            async fn execute(&self, identity: &Identity, action: Action) -> ActionResult;

            $(
                async fn $method(&self, identity: &Identity, params: $params) -> ActionResult {
                    self.execute(identity, Action::$variant(params)).await
                }
            )*
        }
    };
}

action_catalog! {
    CreateProject(CreateProject) => "create_project", create_project, Projects, Create,
        "Create a new project.";
    UpdateProject(UpdateProject) => "update_project", update_project, Projects, Update,
        "Update fields of an existing project.";
    ListProjects(ListProjects) => "list_projects", list_projects, Projects, List,
        "List projects, optionally filtered by status or client.";
    GetProject(ById) => "get_project", get_project, Projects, Get,
        "Fetch one project by id.";

    CreateTask(CreateTask) => "create_task", create_task, Tasks, Create,
        "Create a task inside a project.";
    UpdateTask(UpdateTask) => "update_task", update_task, Tasks, Update,
        "Update a task: status, assignee, priority, due date or text.";
    ListTasks(ListTasks) => "list_tasks", list_tasks, Tasks, List,
        "List tasks, optionally filtered by project, assignee or status.";
    GetTask(ById) => "get_task", get_task, Tasks, Get,
        "Fetch one task by id.";

    CreateMilestone(CreateMilestone) => "create_milestone", create_milestone, Milestones, Create,
        "Create a milestone inside a project.";
    UpdateMilestone(UpdateMilestone) => "update_milestone", update_milestone, Milestones, Update,
        "Update an existing milestone.";
    ListMilestones(ListMilestones) => "list_milestones", list_milestones, Milestones, List,
        "List milestones, optionally filtered by project or status.";
    GetMilestone(ById) => "get_milestone", get_milestone, Milestones, Get,
        "Fetch one milestone by id.";

    CreateClient(CreateClient) => "create_client", create_client, Clients, Create,
        "Create a client record.";
    UpdateClient(UpdateClient) => "update_client", update_client, Clients, Update,
        "Update an existing client.";
    ListClients(ListClients) => "list_clients", list_clients, Clients, List,
        "List clients, optionally filtered by status or search text.";
    GetClient(ById) => "get_client", get_client, Clients, Get,
        "Fetch one client by id.";

    CreateProposal(CreateProposal) => "create_proposal", create_proposal, Proposals, Create,
        "Draft a proposal for a client.";
    UpdateProposal(UpdateProposal) => "update_proposal", update_proposal, Proposals, Update,
        "Update an existing proposal.";
    ListProposals(ListProposals) => "list_proposals", list_proposals, Proposals, List,
        "List proposals, optionally filtered by client or status.";
    GetProposal(ById) => "get_proposal", get_proposal, Proposals, Get,
        "Fetch one proposal by id.";

    CreateTeam(CreateTeam) => "create_team", create_team, Teams, Create,
        "Create a team.";
    UpdateTeam(UpdateTeam) => "update_team", update_team, Teams, Update,
        "Update an existing team.";
    ListTeams(ListTeams) => "list_teams", list_teams, Teams, List,
        "List teams.";
    GetTeam(ById) => "get_team", get_team, Teams, Get,
        "Fetch one team by id.";

    CreateMember(CreateMember) => "add_team_member", add_team_member, Members, Create,
        "Add a user to a team.";
    UpdateMember(UpdateMember) => "update_team_member", update_team_member, Members, Update,
        "Change a team member's role or team.";
    ListMembers(ListMembers) => "list_team_members", list_team_members, Members, List,
        "List team members, optionally filtered by team or skill.";
    GetMember(ById) => "get_team_member", get_team_member, Members, Get,
        "Fetch one team membership by id.";

    CreateSkill(CreateSkill) => "create_skill", create_skill, Skills, Create,
        "Add a skill to the skills catalog.";
    UpdateSkill(UpdateSkill) => "update_skill", update_skill, Skills, Update,
        "Update a skill.";
    ListSkills(ListSkills) => "list_skills", list_skills, Skills, List,
        "List skills, optionally filtered by category.";
    GetSkill(ById) => "get_skill", get_skill, Skills, Get,
        "Fetch one skill by id.";

    CreateChannel(CreateChannel) => "create_channel", create_channel, Channels, Create,
        "Create a chat channel.";
    UpdateChannel(UpdateChannel) => "update_channel", update_channel, Channels, Update,
        "Update a chat channel.";
    ListChannels(ListChannels) => "list_channels", list_channels, Channels, List,
        "List chat channels.";
    GetChannel(ById) => "get_channel", get_channel, Channels, Get,
        "Fetch one channel by id.";

    CreateMessage(CreateMessage) => "send_message", send_message, Messages, Create,
        "Post a message to a channel.";
    UpdateMessage(UpdateMessage) => "edit_message", edit_message, Messages, Update,
        "Edit the text of a message.";
    ListMessages(ListMessages) => "list_messages", list_messages, Messages, List,
        "Read recent messages from a channel.";
    GetMessage(ById) => "get_message", get_message, Messages, Get,
        "Fetch one message by id.";

    CreateDocument(CreateDocument) => "create_document", create_document, Documents, Create,
        "Create a document in the knowledge base.";
    UpdateDocument(UpdateDocument) => "update_document", update_document, Documents, Update,
        "Update a knowledge-base document.";
    ListDocuments(ListDocuments) => "list_documents", list_documents, Documents, List,
        "List knowledge-base documents.";
    GetDocument(ById) => "get_document", get_document, Documents, Get,
        "Fetch one document by id.";

    CreateWikiPage(CreateWikiPage) => "create_wiki_page", create_wiki_page, WikiPages, Create,
        "Create a wiki page.";
    UpdateWikiPage(UpdateWikiPage) => "update_wiki_page", update_wiki_page, WikiPages, Update,
        "Update a wiki page.";
    ListWikiPages(ListWikiPages) => "list_wiki_pages", list_wiki_pages, WikiPages, List,
        "List wiki pages, optionally within a space or under a parent.";
    GetWikiPage(ById) => "get_wiki_page", get_wiki_page, WikiPages, Get,
        "Fetch one wiki page by id.";

    CreateNotification(CreateNotification) => "send_notification", send_notification, Notifications, Create,
        "Send a notification to a user.";
    UpdateNotification(UpdateNotification) => "update_notification", update_notification, Notifications, Update,
        "Mark a notification read or unread.";
    ListNotifications(ListNotifications) => "list_notifications", list_notifications, Notifications, List,
        "List notifications, optionally only unread ones.";
    GetNotification(ById) => "get_notification", get_notification, Notifications, Get,
        "Fetch one notification by id.";
}

/// The full catalog, in declaration order.
pub fn catalog() -> &'static [ActionSpec] {
    CATALOG
}

pub fn find(name: &str) -> Option<&'static ActionSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Tool specs bound for one request. `None` binds the whole catalog.
pub fn tool_specs(enabled: Option<&[ToolCategory]>) -> Vec<ToolSpec> {
    CATALOG
        .iter()
        .filter(|spec| enabled.map_or(true, |cats| cats.contains(&spec.category())))
        .map(ActionSpec::tool_spec)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

/// Transport-neutral description of the single remote call for an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub service: Service,
    pub method: HttpMethod,
    /// Unencoded path segments, e.g. `["tasks", "T1"]`.
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Action {
    pub fn category(&self) -> ToolCategory {
        self.resource().category()
    }

    pub fn request(&self) -> ActionRequest {
        let resource = self.resource();
        let mut params = match self.params_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut path = vec![resource.path().to_string()];

        let (method, query, body) = match self.operation() {
            Operation::Create => (HttpMethod::Post, Vec::new(), Some(Value::Object(params))),
            Operation::Update => {
                if let Some(id) = params.remove("id") {
                    path.push(scalar_to_string(&id));
                }
                (HttpMethod::Patch, Vec::new(), Some(Value::Object(params)))
            }
            Operation::List => {
                let query = params
                    .iter()
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect();
                (HttpMethod::Get, query, None)
            }
            Operation::Get => {
                if let Some(id) = params.remove("id") {
                    path.push(scalar_to_string(&id));
                }
                (HttpMethod::Get, Vec::new(), None)
            }
        };

        ActionRequest {
            service: resource.service(),
            method,
            path,
            query,
            body,
        }
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// A backend entity as returned by a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build from a JSON object. Numeric ids are stringified; a missing id
    /// becomes empty.
    pub fn from_value(value: Value) -> Option<Record> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let id = match fields.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Some(Record { id, fields })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionData {
    Record(Record),
    Records(Vec<Record>),
}

impl ActionData {
    /// Interpret a successful service response body for `operation`.
    ///
    /// Accepts a bare payload or one wrapped as `{"data": …}`; list
    /// responses may also be `{"items": […]}`.
    pub fn from_response(operation: Operation, body: Value) -> Result<ActionData, String> {
        let body = match body {
            Value::Object(mut obj) if obj.contains_key("data") => {
                obj.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };

        match operation {
            Operation::List => {
                let items = match body {
                    Value::Array(items) => items,
                    Value::Object(mut obj) => match obj.remove("items") {
                        Some(Value::Array(items)) => items,
                        _ => return Err("list response is not an array".to_string()),
                    },
                    _ => return Err("list response is not an array".to_string()),
                };
                items
                    .into_iter()
                    .map(|item| Record::from_value(item).ok_or("list item is not an object"))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ActionData::Records)
                    .map_err(str::to_string)
            }
            _ => Record::from_value(body)
                .map(ActionData::Record)
                .ok_or_else(|| "response is not an object".to_string()),
        }
    }
}

/// Uniform `{success, data | error}` outcome of one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(data: ActionData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// JSON text fed back to the model as a tool-result message.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"success":false,"error":"unserializable result"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_covers_every_resource_and_operation() {
        assert_eq!(catalog().len(), 52);
        let names: HashSet<_> = catalog().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 52, "tool names must be unique");
        for spec in catalog() {
            assert_eq!(spec.schema()["type"], "object", "{}", spec.name);
        }
    }

    #[test]
    fn test_decode_create_task() {
        let action = Action::decode(
            "create_task",
            json!({ "projectId": "P1", "title": "Fix login bug" }),
        )
        .unwrap();
        assert_eq!(action.name(), "create_task");
        assert_eq!(action.category(), ToolCategory::Projects);
        match action {
            Action::CreateTask(p) => {
                assert_eq!(p.project_id, "P1");
                assert_eq!(p.title, "Fix login bug");
                assert!(p.due_date.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_and_invalid() {
        assert_eq!(
            Action::decode("launch_rocket", json!({})),
            Err(DecodeError::UnknownTool("launch_rocket".into()))
        );
        assert!(matches!(
            Action::decode("create_task", json!({ "title": 3 })),
            Err(DecodeError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_decode_null_arguments_for_empty_params() {
        assert!(matches!(
            Action::decode("list_teams", Value::Null),
            Ok(Action::ListTeams(_))
        ));
    }

    #[test]
    fn test_request_shapes() {
        let create = Action::CreateTask(CreateTask {
            project_id: "P1".into(),
            title: "Fix login bug".into(),
            ..Default::default()
        })
        .request();
        assert_eq!(create.service, Service::Project);
        assert_eq!(create.method, HttpMethod::Post);
        assert_eq!(create.path, vec!["tasks"]);
        assert_eq!(
            create.body,
            Some(json!({ "projectId": "P1", "title": "Fix login bug" }))
        );

        let update = Action::UpdateWikiPage(UpdateWikiPage {
            id: "W 1".into(),
            title: Some("New".into()),
            ..Default::default()
        })
        .request();
        assert_eq!(update.method, HttpMethod::Patch);
        assert_eq!(update.path, vec!["wiki-pages", "W 1"]);
        assert_eq!(update.body, Some(json!({ "title": "New" })));

        let list = Action::ListNotifications(ListNotifications {
            unread_only: Some(true),
            limit: Some(20),
            ..Default::default()
        })
        .request();
        assert_eq!(list.service, Service::Notification);
        assert_eq!(list.method, HttpMethod::Get);
        assert!(list.body.is_none());
        assert!(list.query.contains(&("unreadOnly".into(), "true".into())));
        assert!(list.query.contains(&("limit".into(), "20".into())));

        let get = Action::GetMember(ById { id: "M7".into() }).request();
        assert_eq!(get.service, Service::Workforce);
        assert_eq!(get.path, vec!["members", "M7"]);
        assert!(get.query.is_empty());
    }

    #[test]
    fn test_tool_specs_filtered_by_category() {
        let all = tool_specs(None);
        assert_eq!(all.len(), 52);

        let comms = tool_specs(Some(&[ToolCategory::Communication][..]));
        assert_eq!(comms.len(), 8);
        assert!(comms.iter().any(|t| t.name == "send_message"));
        assert!(!comms.iter().any(|t| t.name == "create_task"));

        assert!(tool_specs(Some(&[][..])).is_empty());
    }

    #[test]
    fn test_response_unwrapping() {
        let data =
            ActionData::from_response(Operation::Create, json!({ "data": { "id": "T1", "title": "x" } }))
                .unwrap();
        match data {
            ActionData::Record(r) => {
                assert_eq!(r.id, "T1");
                assert_eq!(r.fields["title"], "x");
            }
            other => panic!("unexpected {:?}", other),
        }

        let list =
            ActionData::from_response(Operation::List, json!({ "items": [{ "id": 1 }, { "id": 2 }] }))
                .unwrap();
        assert_eq!(
            list,
            ActionData::Records(vec![
                Record { id: "1".into(), fields: Map::new() },
                Record { id: "2".into(), fields: Map::new() },
            ])
        );

        assert!(ActionData::from_response(Operation::List, json!("nope")).is_err());
    }

    #[test]
    fn test_envelope_serialization() {
        let ok = ActionResult::ok(ActionData::Record(Record {
            id: "T1".into(),
            fields: Map::new(),
        }));
        assert_eq!(
            serde_json::from_str::<Value>(&ok.to_message()).unwrap(),
            json!({ "success": true, "data": { "id": "T1" } })
        );

        let err = ActionResult::err("service unavailable");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "success": false, "error": "service unavailable" })
        );
    }
}
