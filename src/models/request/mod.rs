pub mod captured_request;
