mod registry;
mod search_jobs;
