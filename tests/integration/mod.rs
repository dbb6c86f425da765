mod harvest_run;
mod http_fetcher;
