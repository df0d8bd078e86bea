pub mod search_internet;
