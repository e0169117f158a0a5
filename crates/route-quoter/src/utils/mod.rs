pub mod token_list;
