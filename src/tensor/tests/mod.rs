mod save_load;
