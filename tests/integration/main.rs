//! Integration tests for listing-scraper

mod walk_tests;
