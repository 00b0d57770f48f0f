pub mod recommend_tool;
