// MCP server side: registry tools over stdio and HTTP.
pub mod handler;
