pub mod clear_response;
