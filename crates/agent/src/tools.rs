//! The three tools exposed to the model: `search`, `fetch`, `final_answer`.
//! Schemas match the original's literal tool definitions verbatim.

use crate::transport::{ToolDefinition, ToolFunction};

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            kind: "function",
            function: ToolFunction {
                name: "search",
                description: "Search the web for information relevant to the question.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "The search query" },
                        "max_results": { "type": "integer", "description": "Maximum number of results to return" }
                    },
                    "required": ["query"]
                }),
            },
        },
        ToolDefinition {
            kind: "function",
            function: ToolFunction {
                name: "fetch",
                description: "Fetch and read one or more web pages by URL.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "urls": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "url": { "type": "string" },
                                    "title": { "type": "string" }
                                },
                                "required": ["url"]
                            }
                        }
                    },
                    "required": ["urls"]
                }),
            },
        },
        ToolDefinition {
            kind: "function",
            function: ToolFunction {
                name: "final_answer",
                description: "Submit the final answer to the user, ending the research loop.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "answer": { "type": "string", "description": "The final answer, citing sources as [n]" }
                    },
                    "required": ["answer"]
                }),
            },
        },
    ]
}
