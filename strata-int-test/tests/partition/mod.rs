mod str_partition_test;
