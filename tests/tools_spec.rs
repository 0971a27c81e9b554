use std::sync::Arc;

use agent4ba::db::Database;
use agent4ba::engine::HierarchyEngine;
use agent4ba::models::*;
use agent4ba::tools::Toolbox;
use serde_json::json;
use speculate2::speculate;

fn result_titles(result: &serde_json::Value) -> Vec<String> {
    result
        .as_array()
        .expect("Expected array result")
        .iter()
        .filter_map(|i| i["title"].as_str().map(str::to_string))
        .collect()
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let tools = Toolbox::new(HierarchyEngine::new(db.clone()), Arc::new(db.clone()));
        let project = db.create_project(CreateProjectInput {
            name: "Tools".to_string(),
            description: None,
        }).expect("Failed to create project");
        let epic = tools.engine().create_item(project.id, CreateItemInput {
            item_type: ItemType::Epic,
            title: "Epic1".to_string(),
            description: None,
            status: None,
            parent_id: None,
        }).expect("Failed to create epic");
    }

    describe "envelope" {
        it "wraps results on success" {
            let response = tools.call(1, "get_item", json!({ "id": epic.id }));
            assert!(response.ok);
            assert!(response.error.is_none());
            assert_eq!(response.result.unwrap()["title"], "Epic1");
        }

        it "wraps engine errors as messages" {
            let response = tools.call(1, "move_item", json!({ "id": epic.id, "new_parent_id": epic.id }));
            assert!(!response.ok);
            assert!(response.result.is_none());
            assert_eq!(
                response.error.as_deref(),
                Some("invalid parent type: Epic must be a root item")
            );
        }

        it "rejects payloads of the wrong shape" {
            let response = tools.call(1, "get_item", json!({ "project_id": project.id }));
            assert_eq!(
                response.error.as_deref(),
                Some("provide either id or (type, title, project_id)")
            );
        }
    }

    describe "audit" {
        it "records every call in order, including failures" {
            tools.call(3, "list_items", json!({ "project_id": project.id }));
            tools.call(3, "delete_item", json!({ "id": 9999 }));
            tools.call(3, "not_a_tool", json!(null));

            let actions: Vec<String> = db.get_run_steps(3).expect("Query failed")
                .into_iter().map(|s| s.action).collect();
            assert_eq!(actions, vec!["tool:list_items", "tool:delete_item", "tool:not_a_tool"]);
        }

        it "keeps the raw payload" {
            let payload = json!({ "project_id": project.id, "parent_id": epic.id, "items": [] });
            tools.call(4, "bulk_create_features", payload.clone());

            let steps = db.get_run_steps(4).expect("Query failed");
            assert_eq!(steps[0].payload, payload);
        }
    }

    describe "bulk_create_features" {
        it "de-duplicates across calls" {
            let first = tools.call(1, "bulk_create_features", json!({
                "project_id": project.id,
                "parent_id": epic.id,
                "items": [{ "title": "Existing" }]
            }));
            assert_eq!(result_titles(&first.result.unwrap()), vec!["Existing"]);

            let second = tools.call(1, "bulk_create_features", json!({
                "project_id": project.id,
                "parent_id": epic.id,
                "items": [
                    { "title": "Existing" },
                    { "title": "New1" },
                    { "title": "New1" },
                    { "title": "New2" }
                ]
            }));
            assert_eq!(result_titles(&second.result.unwrap()), vec!["New1", "New2"]);
        }
    }

    describe "list_items" {
        it "applies the default page size" {
            let drafts: Vec<_> = (0..120).map(|i| json!({ "title": format!("F{:03}", i) })).collect();
            tools.call(1, "bulk_create_features", json!({
                "project_id": project.id,
                "parent_id": epic.id,
                "items": drafts
            }));

            let page = tools.call(1, "list_items", json!({ "project_id": project.id }));
            assert_eq!(page.result.unwrap().as_array().unwrap().len(), 100);

            let tail = tools.call(1, "list_items", json!({
                "project_id": project.id,
                "type": "Feature",
                "offset": 110
            }));
            assert_eq!(result_titles(&tail.result.unwrap()).first().map(String::as_str), Some("F110"));
        }
    }
}
