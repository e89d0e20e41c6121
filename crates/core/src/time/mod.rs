pub mod cn_market;
