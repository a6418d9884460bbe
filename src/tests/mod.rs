// Test modules for hubchat
// Each module contains the unit tests for the corresponding source file

mod support;

mod api_tests;
mod tui_tests;
