mod helpers;
mod state_tests;
