//! Typed parameter structs for every action.
//!
//! Each struct is declared once through [`params!`], which derives the serde
//! (camelCase wire names) representation and the JSON Schema handed to the
//! model, so the two can never drift apart.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON Schema for a parameter struct.
pub trait ParamSchema {
    fn schema() -> Value;
}

/// JSON Schema fragment for a single field type.
pub trait FieldType {
    fn json_type() -> Value;
}

impl FieldType for String {
    fn json_type() -> Value {
        json!({ "type": "string" })
    }
}

impl FieldType for u32 {
    fn json_type() -> Value {
        json!({ "type": "integer", "minimum": 0 })
    }
}

impl FieldType for f64 {
    fn json_type() -> Value {
        json!({ "type": "number" })
    }
}

impl FieldType for bool {
    fn json_type() -> Value {
        json!({ "type": "boolean" })
    }
}

impl FieldType for Vec<String> {
    fn json_type() -> Value {
        json!({ "type": "array", "items": { "type": "string" } })
    }
}

fn field_schema<T: FieldType>(description: &str) -> Value {
    let mut schema = T::json_type();
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("description".to_string(), json!(description));
    }
    schema
}

macro_rules! params {
    (
        $(#[$meta:meta])*
        $name:ident {
            required: { $( $rf:ident $rj:literal : $rt:ty = $rd:literal ),* $(,)? }
            optional: { $( $of:ident $oj:literal : $ot:ty = $od:literal ),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(
                #[serde(rename = $rj)]
                pub $rf: $rt,
            )*
            $(
                #[serde(rename = $oj, default, skip_serializing_if = "Option::is_none")]
                pub $of: Option<$ot>,
            )*
        }

        impl ParamSchema for $name {
            #[allow(unused_mut)]
            fn schema() -> Value {
                let mut properties = serde_json::Map::new();
                $( properties.insert($rj.to_string(), field_schema::<$rt>($rd)); )*
                $( properties.insert($oj.to_string(), field_schema::<$ot>($od)); )*
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": [ $( $rj ),* ],
                })
            }
        }
    };
}

params! {
    /// Lookup of a single record.
    ById {
        required: { id "id": String = "Identifier of the record" }
        optional: {}
    }
}

// ── projects ────────────────────────────────────────────────────────

params! {
    CreateProject {
        required: { name "name": String = "Project name" }
        optional: {
            description "description": String = "What the project is about",
            client_id "clientId": String = "Client the project is for",
            status "status": String = "planning, active, on_hold, or completed",
            start_date "startDate": String = "Start date (YYYY-MM-DD)",
            end_date "endDate": String = "Target end date (YYYY-MM-DD)",
            budget "budget": f64 = "Budget amount",
        }
    }
}

params! {
    UpdateProject {
        required: { id "id": String = "Project id" }
        optional: {
            name "name": String = "New project name",
            description "description": String = "New description",
            client_id "clientId": String = "New client id",
            status "status": String = "planning, active, on_hold, or completed",
            start_date "startDate": String = "Start date (YYYY-MM-DD)",
            end_date "endDate": String = "Target end date (YYYY-MM-DD)",
            budget "budget": f64 = "Budget amount",
        }
    }
}

params! {
    ListProjects {
        required: {}
        optional: {
            status "status": String = "Only projects in this status",
            client_id "clientId": String = "Only projects for this client",
            search "search": String = "Free-text filter on the name",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── tasks ───────────────────────────────────────────────────────────

params! {
    CreateTask {
        required: {
            project_id "projectId": String = "Project the task belongs to",
            title "title": String = "Task title",
        }
        optional: {
            description "description": String = "Task details",
            assignee_id "assigneeId": String = "Member the task is assigned to",
            priority "priority": String = "low, medium, high, or urgent",
            status "status": String = "todo, in_progress, review, or done",
            due_date "dueDate": String = "Due date (YYYY-MM-DD)",
            milestone_id "milestoneId": String = "Milestone the task counts toward",
        }
    }
}

params! {
    UpdateTask {
        required: { id "id": String = "Task id" }
        optional: {
            title "title": String = "New title",
            description "description": String = "New details",
            assignee_id "assigneeId": String = "New assignee",
            priority "priority": String = "low, medium, high, or urgent",
            status "status": String = "todo, in_progress, review, or done",
            due_date "dueDate": String = "Due date (YYYY-MM-DD)",
        }
    }
}

params! {
    ListTasks {
        required: {}
        optional: {
            project_id "projectId": String = "Only tasks in this project",
            assignee_id "assigneeId": String = "Only tasks assigned to this member",
            status "status": String = "Only tasks in this status",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── milestones ──────────────────────────────────────────────────────

params! {
    CreateMilestone {
        required: {
            project_id "projectId": String = "Project the milestone belongs to",
            title "title": String = "Milestone title",
        }
        optional: {
            description "description": String = "Milestone details",
            due_date "dueDate": String = "Due date (YYYY-MM-DD)",
        }
    }
}

params! {
    UpdateMilestone {
        required: { id "id": String = "Milestone id" }
        optional: {
            title "title": String = "New title",
            description "description": String = "New details",
            due_date "dueDate": String = "Due date (YYYY-MM-DD)",
            status "status": String = "pending, reached, or missed",
        }
    }
}

params! {
    ListMilestones {
        required: {}
        optional: {
            project_id "projectId": String = "Only milestones in this project",
            status "status": String = "Only milestones in this status",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── clients ─────────────────────────────────────────────────────────

params! {
    CreateClient {
        required: { name "name": String = "Client name" }
        optional: {
            email "email": String = "Contact email",
            phone "phone": String = "Contact phone",
            company "company": String = "Company name",
            industry "industry": String = "Industry",
            notes "notes": String = "Free-form notes",
        }
    }
}

params! {
    UpdateClient {
        required: { id "id": String = "Client id" }
        optional: {
            name "name": String = "New name",
            email "email": String = "Contact email",
            phone "phone": String = "Contact phone",
            company "company": String = "Company name",
            industry "industry": String = "Industry",
            status "status": String = "lead, active, or inactive",
            notes "notes": String = "Free-form notes",
        }
    }
}

params! {
    ListClients {
        required: {}
        optional: {
            status "status": String = "Only clients in this status",
            search "search": String = "Free-text filter on name or company",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── proposals ───────────────────────────────────────────────────────

params! {
    CreateProposal {
        required: {
            client_id "clientId": String = "Client the proposal is addressed to",
            title "title": String = "Proposal title",
        }
        optional: {
            description "description": String = "Scope summary",
            amount "amount": f64 = "Proposed amount",
            valid_until "validUntil": String = "Expiry date (YYYY-MM-DD)",
        }
    }
}

params! {
    UpdateProposal {
        required: { id "id": String = "Proposal id" }
        optional: {
            title "title": String = "New title",
            description "description": String = "Scope summary",
            amount "amount": f64 = "Proposed amount",
            status "status": String = "draft, sent, accepted, or rejected",
            valid_until "validUntil": String = "Expiry date (YYYY-MM-DD)",
        }
    }
}

params! {
    ListProposals {
        required: {}
        optional: {
            client_id "clientId": String = "Only proposals for this client",
            status "status": String = "Only proposals in this status",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── teams ───────────────────────────────────────────────────────────

params! {
    CreateTeam {
        required: { name "name": String = "Team name" }
        optional: {
            description "description": String = "What the team does",
            lead_id "leadId": String = "Member who leads the team",
        }
    }
}

params! {
    UpdateTeam {
        required: { id "id": String = "Team id" }
        optional: {
            name "name": String = "New name",
            description "description": String = "New description",
            lead_id "leadId": String = "New team lead",
        }
    }
}

params! {
    ListTeams {
        required: {}
        optional: {
            search "search": String = "Free-text filter on the name",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── members ─────────────────────────────────────────────────────────

params! {
    CreateMember {
        required: {
            team_id "teamId": String = "Team to add the member to",
            user_id "userId": String = "User to add",
        }
        optional: {
            role "role": String = "Role within the team",
        }
    }
}

params! {
    UpdateMember {
        required: { id "id": String = "Membership id" }
        optional: {
            role "role": String = "New role",
            team_id "teamId": String = "Move to this team",
        }
    }
}

params! {
    ListMembers {
        required: {}
        optional: {
            team_id "teamId": String = "Only members of this team",
            skill "skill": String = "Only members with this skill",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── skills ──────────────────────────────────────────────────────────

params! {
    CreateSkill {
        required: { name "name": String = "Skill name" }
        optional: {
            category "category": String = "Skill category",
            description "description": String = "Skill description",
        }
    }
}

params! {
    UpdateSkill {
        required: { id "id": String = "Skill id" }
        optional: {
            name "name": String = "New name",
            category "category": String = "New category",
            description "description": String = "New description",
        }
    }
}

params! {
    ListSkills {
        required: {}
        optional: {
            category "category": String = "Only skills in this category",
            search "search": String = "Free-text filter on the name",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── channels ────────────────────────────────────────────────────────

params! {
    CreateChannel {
        required: { name "name": String = "Channel name" }
        optional: {
            description "description": String = "Channel purpose",
            is_private "isPrivate": bool = "Whether the channel is invite-only",
            member_ids "memberIds": Vec<String> = "Users to add on creation",
        }
    }
}

params! {
    UpdateChannel {
        required: { id "id": String = "Channel id" }
        optional: {
            name "name": String = "New name",
            description "description": String = "New purpose",
            is_private "isPrivate": bool = "Whether the channel is invite-only",
        }
    }
}

params! {
    ListChannels {
        required: {}
        optional: {
            search "search": String = "Free-text filter on the name",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── messages ────────────────────────────────────────────────────────

params! {
    CreateMessage {
        required: {
            channel_id "channelId": String = "Channel to post in",
            content "content": String = "Message text",
        }
        optional: {
            parent_id "parentId": String = "Message this replies to",
        }
    }
}

params! {
    UpdateMessage {
        required: {
            id "id": String = "Message id",
            content "content": String = "Replacement text",
        }
        optional: {}
    }
}

params! {
    ListMessages {
        required: { channel_id "channelId": String = "Channel to read" }
        optional: {
            before "before": String = "Only messages before this timestamp",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── documents ───────────────────────────────────────────────────────

params! {
    CreateDocument {
        required: {
            title "title": String = "Document title",
            content "content": String = "Document body",
        }
        optional: {
            folder "folder": String = "Folder to file it under",
            tags "tags": Vec<String> = "Tags",
        }
    }
}

params! {
    UpdateDocument {
        required: { id "id": String = "Document id" }
        optional: {
            title "title": String = "New title",
            content "content": String = "New body",
            folder "folder": String = "New folder",
            tags "tags": Vec<String> = "Replacement tags",
        }
    }
}

params! {
    ListDocuments {
        required: {}
        optional: {
            folder "folder": String = "Only documents in this folder",
            search "search": String = "Free-text filter",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── wiki pages ──────────────────────────────────────────────────────

params! {
    CreateWikiPage {
        required: {
            title "title": String = "Page title",
            content "content": String = "Page body (markdown)",
        }
        optional: {
            space "space": String = "Wiki space",
            parent_id "parentId": String = "Parent page",
        }
    }
}

params! {
    UpdateWikiPage {
        required: { id "id": String = "Page id" }
        optional: {
            title "title": String = "New title",
            content "content": String = "New body (markdown)",
            parent_id "parentId": String = "New parent page",
        }
    }
}

params! {
    ListWikiPages {
        required: {}
        optional: {
            space "space": String = "Only pages in this space",
            parent_id "parentId": String = "Only children of this page",
            search "search": String = "Free-text filter",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}

// ── notifications ───────────────────────────────────────────────────

params! {
    CreateNotification {
        required: {
            user_id "userId": String = "Recipient",
            title "title": String = "Notification title",
            message "message": String = "Notification body",
        }
        optional: {
            link "link": String = "Where the notification points",
            priority "priority": String = "low, normal, or high",
        }
    }
}

params! {
    UpdateNotification {
        required: { id "id": String = "Notification id" }
        optional: {
            read "read": bool = "Mark as read (true) or unread (false)",
        }
    }
}

params! {
    ListNotifications {
        required: {}
        optional: {
            user_id "userId": String = "Only notifications for this user",
            unread_only "unreadOnly": bool = "Only unread notifications",
            limit "limit": u32 = "Maximum number of results",
        }
    }
}
