mod cli;

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tiny_fs::{FileDisk, FileKind, FileSystem, FsError, Geometry};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Command::Mkfs { inodes, blocks } = cli.command {
        let geo = Geometry {
            max_inum: inodes,
            max_dnum: blocks,
        };
        let fs = FileSystem::mkfs(&cli.image, geo)
            .with_context(|| format!("formatting {}", cli.image.display()))?;
        let sb = *fs.superblock();
        fs.unmount()?;
        println!(
            "{}: {} inodes, {} data blocks, data region at block {}",
            cli.image.display(),
            sb.max_inum,
            sb.max_dnum,
            sb.d_start_blk
        );
        return Ok(());
    }

    let disk = FileDisk::open(&cli.image).with_context(|| format!("opening {}", cli.image.display()))?;
    let fs = FileSystem::load(Arc::new(disk))
        .with_context(|| format!("reading superblock of {}", cli.image.display()))?;
    run(&fs, cli.command)?;
    fs.unmount()?;
    Ok(())
}

fn run(fs: &FileSystem, command: Command) -> Result<()> {
    match command {
        Command::Mkfs { .. } => unreachable!("handled before the image is opened"),
        Command::Ls { path } => {
            for entry in fs.readdir(&path)? {
                let tag = match entry.kind {
                    FileKind::Directory => "d",
                    FileKind::File => "-",
                };
                println!("{} {:>6} {}", tag, entry.ino, entry.name);
            }
        }
        Command::Stat { path } => {
            let dinode = fs.namei(&path)?;
            println!("inode: {}", dinode.ino);
            println!("kind:  {:?}", dinode.kind);
            println!("mode:  {:o}", dinode.stat.mode);
            println!("links: {}", dinode.nlink);
            println!("size:  {}", dinode.size);
            let blocks: Vec<u32> = dinode.blocks().map(|(_, dno)| dno).collect();
            println!("data:  {:?}", blocks);
            println!("mtime: {}", dinode.stat.mtime);
        }
        Command::Mkdir { path, mode } => {
            fs.mkdir(&path, mode)?;
        }
        Command::Rmdir { path } => fs.rmdir(&path)?,
        Command::Put { source, path, mode } => {
            let data = fs::read(&source).with_context(|| format!("reading {}", source.display()))?;
            match fs.create(&path, mode) {
                Ok(_) => {}
                Err(FsError::AlreadyExists) => fs.truncate(&path, 0)?,
                Err(e) => return Err(e.into()),
            }
            let n = fs.write(&path, 0, &data)?;
            println!("{} -> {}: {} bytes", source.display(), path, n);
        }
        Command::Cat { path } => {
            let size = fs.namei(&path)?.size;
            let data = fs.read(&path, 0, size as usize)?;
            io::stdout().lock().write_all(&data)?;
        }
        Command::Rm { path } => fs.unlink(&path)?,
        Command::Df => {
            let st = fs.statfs()?;
            println!("block size {}, names up to {} bytes", st.bsize, st.namelen);
            println!("inodes: {} used, {} free of {}", st.inodes - st.free_inodes, st.free_inodes, st.inodes);
            println!(
                "blocks: {} used, {} free of {}",
                st.blocks - st.free_blocks,
                st.free_blocks,
                st.blocks
            );
        }
    }
    Ok(())
}
