mod client_test;
mod statement_test;
mod table_test;
